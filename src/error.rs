//! Error types for the batch orchestration core.
//!

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Processor error in {task_type}: {message}")]
    ProcessorError { task_type: String, message: String },
    #[error("Processor panicked in {task_type}: {message}")]
    ProcessorPanic { task_type: String, message: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Dispatch error: {0}")]
    DispatchError(String),
}

impl TaskerError {
    /// Build a processor-level error for the given task type tag
    pub fn processor(task_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProcessorError {
            task_type: task_type.into(),
            message: message.into(),
        }
    }

    /// Whether re-running the task runner could plausibly succeed.
    ///
    /// A missing task or a malformed task type will not fix itself between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::TaskNotFound(_) | Self::UnknownTaskType(_) | Self::ConfigurationError(_)
        )
    }
}

impl From<serde_json::Error> for TaskerError {
    fn from(error: serde_json::Error) -> Self {
        TaskerError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for TaskerError {
    fn from(err: sqlx::Error) -> Self {
        TaskerError::DatabaseError(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for TaskerError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        TaskerError::ConfigurationError(err.to_string())
    }
}

impl From<crate::domain::RepositoryError> for TaskerError {
    fn from(err: crate::domain::RepositoryError) -> Self {
        TaskerError::DatabaseError(err.to_string())
    }
}

pub type TaskerResult<T> = Result<T, TaskerError>;
