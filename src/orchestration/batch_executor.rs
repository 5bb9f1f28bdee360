//! # Batch Executor
//!
//! Drives the work items of one task through its processor.
//!
//! ## Execution Modes
//!
//! - **Sequential**: items run one at a time. The task status is re-read from the store
//!   before each item; a terminal status stops the batch before the next item starts.
//! - **Bounded parallel**: a semaphore caps in-flight items at the task's
//!   `concurrencyLimit` (or the configured default). The status check runs inside each
//!   worker before it processes its item. Once a stop is observed no further items are
//!   scheduled; items already in flight finish and are recorded.
//!
//! In both modes a panic inside `process_one` is caught and recorded as an item error,
//! and the final status follows [`final_status`](super::progress_reporter::final_status).

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::processor::WorkItemProcessor;
use super::progress_reporter::ProgressReporter;
use super::types::{BatchSummary, ExecutionMode, ItemError, ItemOutput, WorkItem};
use crate::config::ExecutorConfig;
use crate::constants::config_keys;
use crate::database::TaskStore;
use crate::error::{TaskerError, TaskerResult};
use crate::models::{Task, TaskStatus};

#[derive(Clone)]
pub struct BatchExecutor {
    store: Arc<dyn TaskStore>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchExecutor {
    pub fn new(store: Arc<dyn TaskStore>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Pool size for a task: its `concurrencyLimit` if set, clamped to the configured bounds
    pub fn concurrency_for(&self, task: &Task) -> usize {
        let requested = task
            .config_value(config_keys::CONCURRENCY_LIMIT)
            .and_then(serde_json::Value::as_u64)
            .and_then(|limit| usize::try_from(limit).ok());
        self.config.effective_concurrency(requested)
    }

    /// Enumerate and process every outstanding item of `task`
    pub async fn execute(
        &self,
        task: &Task,
        processor: Arc<dyn WorkItemProcessor>,
    ) -> TaskerResult<BatchSummary> {
        let mut reporter = ProgressReporter::new(self.store.clone(), task.id, processor.step_label());
        let items = processor.enumerate(task).await?;

        if items.is_empty() {
            reporter.complete_empty(processor.empty_message()).await?;
            info!(
                task_id = %task.id,
                task_type = %task.task_type,
                "✅ Nothing to process, task completed"
            );
            return Ok(BatchSummary::empty());
        }

        reporter.begin(items.len()).await?;

        match processor.execution_mode() {
            ExecutionMode::Sequential => self.run_sequential(task, processor, items, reporter).await,
            ExecutionMode::BoundedParallel => {
                self.run_parallel(task, processor, items, reporter).await
            }
        }
    }

    async fn run_sequential(
        &self,
        task: &Task,
        processor: Arc<dyn WorkItemProcessor>,
        items: Vec<WorkItem>,
        mut reporter: ProgressReporter,
    ) -> TaskerResult<BatchSummary> {
        for (index, item) in items.iter().enumerate() {
            let current = self.store.load(task.id).await?;
            if current.status.is_terminal() {
                reporter.mark_stopped(current.status).await?;
                return Ok(stopped_summary(&reporter, current.status));
            }

            reporter.set_current(item, index + 1);
            match process_guarded(processor.as_ref(), task, item).await {
                Ok(output) => reporter.record_success(item, output),
                Err(error) => {
                    debug!(task_id = %task.id, item_id = %item.id, error = %error, "Work item failed");
                    reporter.record_error(item, &error);
                }
            }
            reporter.flush().await?;
        }

        finish(task, reporter).await
    }

    async fn run_parallel(
        &self,
        task: &Task,
        processor: Arc<dyn WorkItemProcessor>,
        items: Vec<WorkItem>,
        reporter: ProgressReporter,
    ) -> TaskerResult<BatchSummary> {
        let concurrency = self.concurrency_for(task);
        debug!(task_id = %task.id, concurrency, "Starting bounded-parallel batch");

        let reporter = Arc::new(Mutex::new(reporter));
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let shared_task = Arc::new(task.clone());
        let mut workers: JoinSet<TaskerResult<()>> = JoinSet::new();
        let mut first_error: Option<TaskerError> = None;

        for (index, item) in items.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| TaskerError::InvalidState(format!("Worker pool closed: {e}")))?;

            // Reap finished workers so a store failure stops scheduling early
            while let Some(joined) = workers.try_join_next() {
                record_worker_result(joined, &mut first_error);
            }
            if first_error.is_some() || reporter.lock().await.stopped().is_some() {
                break;
            }

            let store = self.store.clone();
            let processor = processor.clone();
            let reporter = reporter.clone();
            let task = shared_task.clone();

            workers.spawn(async move {
                let _permit = permit;

                let current = store.load(task.id).await?;
                if current.status.is_terminal() {
                    reporter.lock().await.note_stop(current.status);
                    return Ok(());
                }

                reporter.lock().await.set_current(&item, index + 1);
                let result = process_guarded(processor.as_ref(), &task, &item).await;

                let mut reporter = reporter.lock().await;
                match result {
                    Ok(output) => reporter.record_success(&item, output),
                    Err(error) => reporter.record_error(&item, &error),
                }
                reporter.flush().await?;
                Ok(())
            });
        }

        while let Some(joined) = workers.join_next().await {
            record_worker_result(joined, &mut first_error);
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let mut reporter = Arc::try_unwrap(reporter)
            .map_err(|_| TaskerError::InvalidState("Progress reporter still shared after pool drained".to_string()))?
            .into_inner();

        if let Some(observed) = reporter.stopped() {
            reporter.mark_stopped(observed).await?;
            return Ok(stopped_summary(&reporter, observed));
        }

        finish(task, reporter).await
    }
}

async fn finish(task: &Task, mut reporter: ProgressReporter) -> TaskerResult<BatchSummary> {
    let (status, outcome) = reporter.finish().await?;
    if !outcome.is_applied() {
        warn!(
            task_id = %task.id,
            "Task became terminal before its final status could be written; keeping existing status"
        );
        if let Some(observed) = reporter.stopped() {
            return Ok(stopped_summary(&reporter, observed));
        }
    }

    info!(
        task_id = %task.id,
        task_type = %task.task_type,
        status = %status,
        success = reporter.success_count(),
        errors = reporter.error_count(),
        "✅ Batch finished"
    );

    Ok(BatchSummary {
        total: reporter.total(),
        success_count: reporter.success_count(),
        error_count: reporter.error_count(),
        final_status: status,
        stopped: false,
    })
}

fn stopped_summary(reporter: &ProgressReporter, observed: TaskStatus) -> BatchSummary {
    info!(
        status = %observed,
        processed = reporter.processed(),
        total = reporter.total(),
        "⏹️ Batch stopped: task became terminal externally"
    );
    BatchSummary {
        total: reporter.total(),
        success_count: reporter.success_count(),
        error_count: reporter.error_count(),
        final_status: observed,
        stopped: true,
    }
}

fn record_worker_result(
    joined: Result<TaskerResult<()>, tokio::task::JoinError>,
    first_error: &mut Option<TaskerError>,
) {
    let error = match joined {
        Ok(Ok(())) => return,
        Ok(Err(error)) => error,
        Err(join_error) => TaskerError::InvalidState(format!("Worker task failed: {join_error}")),
    };
    warn!(error = %error, "Batch worker failed");
    first_error.get_or_insert(error);
}

/// Run `process_one`, converting a panic into an item error
async fn process_guarded(
    processor: &dyn WorkItemProcessor,
    task: &Task,
    item: &WorkItem,
) -> Result<ItemOutput, ItemError> {
    match AssertUnwindSafe(processor.process_one(task, item))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(ItemError::Panicked(panic_message(panic.as_ref()))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
