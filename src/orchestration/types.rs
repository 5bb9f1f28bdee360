//! Shared types between the batch executor, the progress reporter and processors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::RepositoryError;
use crate::generation::GenerationError;
use crate::models::TaskStatus;

/// One unit of work enumerated by a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    /// Human-readable name shown in progress (chunk name, file name, question text)
    pub label: Option<String>,
    /// Processor-owned data needed to process the item
    pub payload: Value,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
            payload,
        }
    }

    /// Build an item whose payload is a serialized domain record
    pub fn from_record<T: Serialize>(
        id: impl Into<String>,
        label: impl Into<String>,
        record: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(id, label, serde_json::to_value(record)?))
    }

    /// Deserialize the payload back into the record it was built from
    pub fn record<T: serde::de::DeserializeOwned>(&self) -> Result<T, ItemError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| ItemError::InvalidItem(format!("{}: {e}", self.id)))
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// What a successful item produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemOutput {
    /// Extra fields merged into the item's finished-list entry
    pub extra: Map<String, Value>,
    /// Counters summed into the payload's extension map across items
    pub tallies: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl ItemOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn tally(mut self, key: impl Into<String>, amount: i64) -> Self {
        self.tallies.push((key.into(), amount));
        self
    }

    /// Tally a collection size, saturating at `i64::MAX`
    pub fn tally_count(self, key: impl Into<String>, count: usize) -> Self {
        self.tally(key, i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Failure of a single work item; recorded and the batch continues
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemError {
    #[error("{0}")]
    Generation(#[from] GenerationError),
    #[error("Failed to parse generation output: {0}")]
    Parse(String),
    #[error("Failed to persist result: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("Invalid work item: {0}")]
    InvalidItem(String),
    #[error("Item processing panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One item at a time with a cancellation check before each item
    Sequential,
    /// Semaphore-bounded worker pool with a cancellation check inside each worker
    BoundedParallel,
}

/// Result of driving a task's work items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Status the task ended in; for a stopped batch this is the status that was observed
    pub final_status: TaskStatus,
    /// True when processing stopped because the task became terminal externally
    pub stopped: bool,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.success_count + self.error_count
    }

    pub(crate) fn empty() -> Self {
        Self {
            total: 0,
            success_count: 0,
            error_count: 0,
            final_status: TaskStatus::Completed,
            stopped: false,
        }
    }
}
