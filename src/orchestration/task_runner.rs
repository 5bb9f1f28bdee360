//! # Task Runner
//!
//! Executes one task end to end.
//!
//! ## Run Flow
//!
//! 1. Load the task; a terminal task is left untouched and nothing else happens
//! 2. A task whose `start_time` is older than the task timeout is failed
//! 3. `start_time` is stamped on the first run and kept on later runs
//! 4. The task is (re)marked running
//! 5. The processor for its task type is resolved; an unknown type fails the task
//! 6. The [`BatchExecutor`] drives the items and writes the final status
//! 7. Any error or panic escaping steps 1-6 fails the task with the message recorded
//!
//! [`TaskRunner::run_with_retry`] wraps `run` in a bounded retry with fixed backoff.
//! Once a failure has been recorded on the task, another attempt would only observe
//! the terminal status, so retries are reserved for failures that could not be
//! recorded (for example the store being unreachable).

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::batch_executor::{panic_message, BatchExecutor};
use super::types::BatchSummary;
use crate::config::{RunnerConfig, TaskerBatchConfig, TimeoutConfig};
use crate::constants::notes;
use crate::database::TaskStore;
use crate::error::{TaskerError, TaskerResult};
use crate::logging::log_task_operation;
use crate::models::{LogLevel, SaveOutcome, TaskStatus, TaskUpdate};
use crate::registry::ProcessorRegistry;

/// How a run ended when it did not error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The task was already terminal; nothing was done
    AlreadyTerminal(TaskStatus),
    /// The task exceeded its time budget and was failed
    TimedOut,
    /// The task type tag has no processor; the task was failed
    UnknownTaskType(String),
    /// The batch ran (to completion or to a cooperative stop)
    Finished(BatchSummary),
}

struct AttemptFailure {
    error: TaskerError,
    /// Whether the failure was written to the task
    recorded: bool,
}

pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
    registry: Arc<ProcessorRegistry>,
    executor: BatchExecutor,
    timeouts: TimeoutConfig,
    runner: RunnerConfig,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("registry", &self.registry)
            .field("timeouts", &self.timeouts)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<ProcessorRegistry>,
        executor: BatchExecutor,
        config: &TaskerBatchConfig,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            timeouts: config.timeouts.clone(),
            runner: config.runner.clone(),
        }
    }

    /// Run the task once. Errors are recorded on the task before being returned.
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn run(&self, task_id: Uuid) -> TaskerResult<RunOutcome> {
        self.attempt(task_id).await.map_err(|failure| failure.error)
    }

    /// Run the task with bounded retries around unexpected errors
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn run_with_retry(&self, task_id: Uuid) -> TaskerResult<RunOutcome> {
        let max_attempts = self.runner.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(task_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptFailure { error, recorded }) => {
                    if recorded || !error.is_retryable() || attempt >= max_attempts {
                        return Err(error);
                    }
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_seconds = self.runner.retry_backoff_seconds,
                        error = %error,
                        "Task run failed before the failure could be recorded, retrying"
                    );
                    tokio::time::sleep(self.runner.retry_backoff()).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, task_id: Uuid) -> Result<RunOutcome, AttemptFailure> {
        let result = match AssertUnwindSafe(self.run_steps(task_id)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(TaskerError::ProcessorPanic {
                task_type: "unknown".to_string(),
                message: panic_message(panic.as_ref()),
            }),
        };

        let error = match result {
            Ok(outcome) => return Ok(outcome),
            Err(error) => error,
        };

        if matches!(error, TaskerError::TaskNotFound(_)) {
            warn!(task_id = %task_id, "Task not found, nothing to run");
            return Err(AttemptFailure {
                error,
                recorded: false,
            });
        }

        error!(task_id = %task_id, error = %error, "❌ Task run failed");
        let recorded = match self.record_failure(task_id, &error).await {
            Ok(()) => true,
            Err(record_error) => {
                error!(
                    task_id = %task_id,
                    error = %record_error,
                    "Failed to record task failure"
                );
                false
            }
        };
        Err(AttemptFailure { error, recorded })
    }

    async fn run_steps(&self, task_id: Uuid) -> TaskerResult<RunOutcome> {
        let task = self.store.load(task_id).await?;
        if task.is_terminal() {
            info!(task_id = %task_id, status = %task.status, "Task already terminal, skipping");
            return Ok(RunOutcome::AlreadyTerminal(task.status));
        }

        let now = Utc::now();
        if let Some(elapsed) = task.running_for(now) {
            if elapsed > self.timeouts.task_timeout() {
                self.fail(task_id, notes::RUNNER_TIMEOUT).await?;
                warn!(
                    task_id = %task_id,
                    elapsed_minutes = elapsed.num_minutes(),
                    "⏰ Task exceeded its time budget"
                );
                return Ok(RunOutcome::TimedOut);
            }
        }

        let mut start = TaskUpdate::new().status(TaskStatus::Running);
        if task.start_time.is_none() {
            start = start.start_time(now);
        }
        if self.store.save(task_id, start).await? == SaveOutcome::TerminalPreserved {
            let current = self.store.load(task_id).await?;
            return Ok(RunOutcome::AlreadyTerminal(current.status));
        }

        let processor = match self.registry.resolve(&task.task_type) {
            Ok(processor) => processor,
            Err(TaskerError::UnknownTaskType(tag)) => {
                self.fail(task_id, &format!("{}: {tag}", notes::UNKNOWN_TASK_TYPE))
                    .await?;
                warn!(task_id = %task_id, task_type = %tag, "Unknown task type");
                return Ok(RunOutcome::UnknownTaskType(tag));
            }
            Err(other) => return Err(other),
        };

        let task = self.store.load(task_id).await?;
        log_task_operation("run", task_id, Some(&task.task_type), task.status, None);

        let summary = self.executor.execute(&task, processor).await?;
        log_task_operation(
            "finish",
            task_id,
            Some(&task.task_type),
            summary.final_status,
            Some(&format!(
                "succeeded {}, failed {}",
                summary.success_count, summary.error_count
            )),
        );
        Ok(RunOutcome::Finished(summary))
    }

    async fn fail(&self, task_id: Uuid, note: &str) -> TaskerResult<SaveOutcome> {
        self.store
            .save(task_id, TaskUpdate::new().status(TaskStatus::Failed).note(note))
            .await
    }

    /// Mark the task failed with the error in its note and error list
    async fn record_failure(&self, task_id: Uuid, error: &TaskerError) -> TaskerResult<()> {
        let task = self.store.load(task_id).await?;
        let message = format!("Processing failed: {error}");

        let mut detail = task.detail;
        detail.error_list.push(message.clone());
        detail.push_log(LogLevel::Error, message.clone());

        self.store
            .save(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Failed)
                    .detail(detail)
                    .note(message),
            )
            .await?;
        Ok(())
    }
}
