//! # Models
//!
//! Data layer of the orchestration core.
//!
//! - [`task`] - the durable task record, its status codes and task type tags
//! - [`progress`] - the structured progress payload stored in `Task::detail`

pub mod progress;
pub mod task;

pub use progress::{FinishedItem, ItemStatus, LogEntry, LogLevel, ProgressPayload};
pub use task::{NewTask, SaveOutcome, Task, TaskSnapshot, TaskStatus, TaskType, TaskUpdate};
