//! # Orchestration Engine
//!
//! Drives batch tasks from creation to a terminal status.
//!
//! ## Core Components
//!
//! - **TaskRunner**: loads a task, applies the timeout budget, resolves its processor
//!   and hands it to the executor; wraps everything in a bounded retry
//! - **BatchExecutor**: sequential or bounded-parallel item loop with cooperative
//!   cancellation checks and panic isolation
//! - **ProgressReporter**: accumulates counters, logs and the finished list and flushes
//!   them after every item
//! - **RecoverySweeper**: periodic scan of running tasks that fails dead ones and
//!   re-dispatches stalled ones
//! - **TaskDispatcher**: asynchronous hand-off used by task creation and the sweeper
//! - **TaskService**: create, poll and interrupt operations for callers

pub mod batch_executor;
pub mod dispatcher;
pub mod processor;
pub mod progress_reporter;
pub mod recovery_sweeper;
pub mod task_runner;
pub mod task_service;
pub mod types;

pub use batch_executor::BatchExecutor;
pub use dispatcher::{TaskDispatcher, TokioDispatcher};
pub use processor::WorkItemProcessor;
pub use progress_reporter::{final_status, ProgressReporter};
pub use recovery_sweeper::{
    classify, RecoverySweeper, SweepDecision, SweepFinding, SweepReport, SweepThresholds,
};
pub use task_runner::{RunOutcome, TaskRunner};
pub use task_service::TaskService;
pub use types::{BatchSummary, ExecutionMode, ItemError, ItemOutput, WorkItem};
