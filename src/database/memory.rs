use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TaskerError, TaskerResult};
use crate::models::{NewTask, SaveOutcome, Task, TaskStatus, TaskUpdate};

/// In-process task store.
///
/// Each update runs while holding the entry's shard lock, which gives the same
/// read-check-write atomicity as the conditional update in [`PgTaskStore`](super::PgTaskStore).
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record, bypassing creation defaults.
    ///
    /// Used to seed historical or corrupted rows (missing `created_at`, stale
    /// `start_time`, unknown task type tags).
    pub fn insert_task(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, new_task: NewTask) -> TaskerResult<Task> {
        let task = Task::from_new(new_task, Utc::now());
        self.tasks.insert(task.id, task.clone());
        debug!(task_id = %task.id, task_type = %task.task_type, "Created task");
        Ok(task)
    }

    async fn load(&self, id: Uuid) -> TaskerResult<Task> {
        self.tasks
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(TaskerError::TaskNotFound(id))
    }

    async fn save(&self, id: Uuid, update: TaskUpdate) -> TaskerResult<SaveOutcome> {
        let mut entry = self.tasks.get_mut(&id).ok_or(TaskerError::TaskNotFound(id))?;
        Ok(update.apply_to(entry.value_mut(), Utc::now()))
    }

    async fn list_running(&self) -> TaskerResult<Vec<Task>> {
        let mut running: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| entry.status == TaskStatus::Running)
            .map(|entry| entry.value().clone())
            .collect();
        running.sort_by_key(|task| task.created_at);
        Ok(running)
    }
}
