//! # Task Model
//!
//! The task is the durable unit of orchestration.
//!
//! ## Overview
//!
//! Each task names a task type (which work item processor runs it), carries an opaque
//! configuration blob fixed at creation, and accumulates progress while the runner
//! drives its work items. Status codes are persisted as small integers:
//!
//! | code | status      | terminal |
//! |------|-------------|----------|
//! | 0    | running     | no       |
//! | 1    | completed   | yes      |
//! | 2    | failed      | yes      |
//! | 3    | interrupted | yes      |
//!
//! A freshly created task and a resumed task are indistinguishable to readers, so
//! "pending" and "running" share code 0.
//!
//! ## Write Semantics
//!
//! [`TaskUpdate::apply_to`] is the single definition of the merge rules every store
//! follows: supplied fields replace stored ones, a status change is only accepted while
//! the task is still running, and `end_time` is stamped in the same write that makes a
//! task terminal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::progress::ProgressPayload;
use crate::error::{TaskerError, TaskerResult};

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created or executing; the only non-terminal status
    #[default]
    Running,
    /// All work finished with at least one success, or nothing to do
    Completed,
    /// Every processed item failed, the task timed out, or the runner hit an error
    Failed,
    /// Stopped by an external request
    Interrupted,
}

impl TaskStatus {
    /// Persisted integer code
    pub const fn code(self) -> i16 {
        match self {
            Self::Running => 0,
            Self::Completed => 1,
            Self::Failed => 2,
            Self::Interrupted => 3,
        }
    }

    /// Decode a persisted integer code
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Running),
            1 => Some(Self::Completed),
            2 => Some(Self::Failed),
            3 => Some(Self::Interrupted),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" | "pending" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "interrupted" => Ok(Self::Interrupted),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// The fixed set of batch operations the core knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    QuestionGeneration,
    AnswerGeneration,
    FileProcessing,
    DataCleaning,
    DatasetEvaluation,
    MultiTurnGeneration,
    DataDistillation,
    ImageQuestionGeneration,
    ImageDatasetGeneration,
    ImageDatasetEvaluation,
}

impl TaskType {
    pub const ALL: [TaskType; 10] = [
        Self::QuestionGeneration,
        Self::AnswerGeneration,
        Self::FileProcessing,
        Self::DataCleaning,
        Self::DatasetEvaluation,
        Self::MultiTurnGeneration,
        Self::DataDistillation,
        Self::ImageQuestionGeneration,
        Self::ImageDatasetGeneration,
        Self::ImageDatasetEvaluation,
    ];

    /// Persisted string tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuestionGeneration => "question-generation",
            Self::AnswerGeneration => "answer-generation",
            Self::FileProcessing => "file-processing",
            Self::DataCleaning => "data-cleaning",
            Self::DatasetEvaluation => "dataset-evaluation",
            Self::MultiTurnGeneration => "multi-turn-generation",
            Self::DataDistillation => "data-distillation",
            Self::ImageQuestionGeneration => "image-question-generation",
            Self::ImageDatasetGeneration => "image-dataset-generation",
            Self::ImageDatasetEvaluation => "image-dataset-evaluation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task_type| task_type.as_str() == s)
            .ok_or_else(|| format!("Invalid task type: {s}"))
    }
}

/// A task record as persisted by the task store.
///
/// `task_type` is kept as the raw stored tag so that a row written by a newer or
/// misbehaving producer still loads; [`Task::kind`] is where it becomes typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_count: i64,
    pub completed_count: i64,
    pub config: serde_json::Value,
    pub detail: ProgressPayload,
    pub note: String,
    /// Absent only in corrupted rows; the recovery sweeper treats that as an anomaly
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build the initial record for a newly created task
    pub fn from_new(new_task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: new_task.project_id,
            task_type: new_task.task_type,
            status: TaskStatus::Running,
            start_time: None,
            end_time: None,
            total_count: new_task.total_count,
            completed_count: 0,
            config: new_task.config,
            detail: ProgressPayload::default(),
            note: String::new(),
            created_at: Some(now),
            updated_at: now,
        }
    }

    /// Typed task type, or `UnknownTaskType` for an unrecognised tag
    pub fn kind(&self) -> TaskerResult<TaskType> {
        self.task_type
            .parse()
            .map_err(|_| TaskerError::UnknownTaskType(self.task_type.clone()))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time elapsed since the runner first started this task
    pub fn running_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.start_time.map(|start| now - start)
    }

    /// Time elapsed since creation
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at.map(|created| now - created)
    }

    /// Look up a top-level key of the task configuration
    pub fn config_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }
}

/// Parameters supplied by the caller creating a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub project_id: String,
    pub task_type: String,
    pub config: serde_json::Value,
    /// Item count hint; 0 means "not known yet"
    #[serde(default)]
    pub total_count: i64,
}

impl NewTask {
    pub fn new(project_id: impl Into<String>, task_type: TaskType, config: serde_json::Value) -> Self {
        Self {
            project_id: project_id.into(),
            task_type: task_type.as_str().to_string(),
            config,
            total_count: 0,
        }
    }

    pub fn with_total_count(mut self, total_count: i64) -> Self {
        self.total_count = total_count;
        self
    }
}

/// Result of a store write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    /// Every supplied field was written
    Applied,
    /// The task was already terminal, so the requested status change was dropped.
    /// Progress fields were still written; the note was kept.
    TerminalPreserved,
}

impl SaveOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Field-level partial update of a task.
///
/// `end_time` is absent: stores derive it from the status transition. The note is
/// only written while the task is running, so the note of a terminal task is always
/// the one written with its terminal status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub total_count: Option<i64>,
    pub completed_count: Option<i64>,
    pub detail: Option<ProgressPayload>,
    pub note: Option<String>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn total_count(mut self, total_count: i64) -> Self {
        self.total_count = Some(total_count);
        self
    }

    pub fn completed_count(mut self, completed_count: i64) -> Self {
        self.completed_count = Some(completed_count);
        self
    }

    pub fn detail(mut self, detail: ProgressPayload) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge this update into `task` following the store write rules
    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) -> SaveOutcome {
        let mut outcome = SaveOutcome::Applied;
        let was_running = !task.status.is_terminal();

        if let Some(status) = self.status {
            if task.status.is_terminal() {
                outcome = SaveOutcome::TerminalPreserved;
            } else {
                task.status = status;
                if status.is_terminal() {
                    task.end_time = Some(now);
                }
            }
        }

        if let Some(start_time) = self.start_time {
            task.start_time = Some(start_time);
        }
        if let Some(total_count) = self.total_count {
            task.total_count = total_count;
        }
        if let Some(completed_count) = self.completed_count {
            task.completed_count = completed_count;
        }
        if let Some(detail) = &self.detail {
            task.detail = detail.clone();
        }
        if let Some(note) = self.note.as_ref().filter(|_| was_running) {
            task.note = note.clone();
        }

        task.updated_at = now;
        outcome
    }
}

/// What a polling caller sees of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub task_type: String,
    pub status: TaskStatus,
    pub status_code: i16,
    pub total_count: i64,
    pub completed_count: i64,
    pub detail: ProgressPayload,
    pub note: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            task_type: task.task_type.clone(),
            status: task.status,
            status_code: task.status.code(),
            total_count: task.total_count,
            completed_count: task.completed_count,
            detail: task.detail.clone(),
            note: task.note.clone(),
            start_time: task.start_time,
            end_time: task.end_time,
        }
    }
}
