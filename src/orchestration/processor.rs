//! # Work Item Processor
//!
//! Pluggable per-task-type logic. A processor only knows how to list the outstanding
//! items of a task and how to process one of them; the [`BatchExecutor`] owns ordering,
//! concurrency, cancellation checks, progress and the final status.
//!
//! [`BatchExecutor`]: super::BatchExecutor

use async_trait::async_trait;

use super::types::{ExecutionMode, ItemError, ItemOutput, WorkItem};
use crate::error::TaskerResult;
use crate::models::{Task, TaskType};

#[async_trait]
pub trait WorkItemProcessor: Send + Sync {
    fn task_type(&self) -> TaskType;

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Sequential
    }

    /// Progress label for the operation, e.g. "Generating answers"
    fn step_label(&self) -> &'static str;

    /// Note written when there is nothing to do
    fn empty_message(&self) -> &'static str;

    /// Outstanding work items. An error here fails the task through the runner.
    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>>;

    /// Process a single item. Errors are recorded against the item only.
    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError>;
}
