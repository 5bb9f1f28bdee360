//! Asynchronous hand-off of a task to a runner.
//!
//! Task creation and the recovery sweeper both need "process this task later"
//! without waiting for the batch to finish. [`TokioDispatcher`] spawns
//! [`TaskRunner::run_with_retry`] on the current runtime; hosts with a real queue can
//! implement [`TaskDispatcher`] themselves.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

use super::task_runner::TaskRunner;
use crate::error::{TaskerError, TaskerResult};
use crate::logging::log_error;

#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task_id: Uuid) -> TaskerResult<()>;
}

/// Dispatcher that runs each task on its own tokio task
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    runner: Arc<TaskRunner>,
}

impl TokioDispatcher {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TaskDispatcher for TokioDispatcher {
    async fn dispatch(&self, task_id: Uuid) -> TaskerResult<()> {
        let handle = Handle::try_current()
            .map_err(|e| TaskerError::DispatchError(format!("No tokio runtime available: {e}")))?;
        let runner = self.runner.clone();

        handle.spawn(async move {
            match runner.run_with_retry(task_id).await {
                Ok(outcome) => info!(task_id = %task_id, outcome = ?outcome, "Dispatched task finished"),
                Err(e) => log_error(
                    "dispatcher",
                    "run_with_retry",
                    &e.to_string(),
                    Some(&task_id.to_string()),
                ),
            }
        });

        debug!(task_id = %task_id, "Task dispatched");
        Ok(())
    }
}
