//! # Task Store
//!
//! Durable task records behind a single async contract.
//!
//! ## Overview
//!
//! The store is the only shared state between task runners, the recovery sweeper and
//! pollers. Every write is a field-level partial update (see
//! [`TaskUpdate`](crate::models::TaskUpdate)) and carries the terminal guard: a status
//! change is applied only while the stored status is still running, and `end_time` is
//! stamped in the same atomic write that makes a task terminal. Callers that race (an
//! interrupt landing while a runner finishes) therefore never clobber each other's
//! terminal status.
//!
//! ## Implementations
//!
//! - [`memory`] - `DashMap`-backed store for embedding and tests
//! - [`postgres`] - PostgreSQL store built on SQLx with a conditional single-row update
//! - [`connection`] - connection pool setup from configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tasker_batch::database::{InMemoryTaskStore, TaskStore};
//! use tasker_batch::models::{NewTask, TaskStatus, TaskType, TaskUpdate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryTaskStore::new();
//! let task = store
//!     .create(NewTask::new("project-1", TaskType::DataCleaning, serde_json::json!({})))
//!     .await?;
//! store.save(task.id, TaskUpdate::new().status(TaskStatus::Interrupted)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TaskerResult;
use crate::models::{NewTask, Task, TaskUpdate};

pub mod connection;
pub mod memory;
pub mod postgres;

pub use crate::models::SaveOutcome;
pub use connection::DatabaseConnection;
pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Persistence contract for task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task with status running
    async fn create(&self, new_task: NewTask) -> TaskerResult<Task>;

    /// Load a task, failing with `TaskNotFound` when it does not exist
    async fn load(&self, id: Uuid) -> TaskerResult<Task>;

    /// Apply a partial update under the terminal guard
    async fn save(&self, id: Uuid, update: TaskUpdate) -> TaskerResult<SaveOutcome>;

    /// All tasks whose status is running, oldest first
    async fn list_running(&self) -> TaskerResult<Vec<Task>>;
}
