//! # Progress Payload
//!
//! Structured progress stored in a task's `detail` field and polled by UIs. The wire
//! shape is camelCase JSON; keys the core does not know about (written by a processor
//! as task-specific metadata) survive a load/save cycle through `extensions`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a progress log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Outcome of a single work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

/// One entry of the finished list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedItem {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Processor-specific output (question count, score, chunk count, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinishedItem {
    pub fn success(item_id: impl Into<String>, label: Option<String>, extra: Map<String, Value>) -> Self {
        Self {
            item_id: item_id.into(),
            label,
            status: ItemStatus::Success,
            error: None,
            extra,
        }
    }

    pub fn failure(item_id: impl Into<String>, label: Option<String>, error: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            label,
            status: ItemStatus::Error,
            error: Some(error.into()),
            extra: Map::new(),
        }
    }
}

/// Task progress as seen by pollers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressPayload {
    pub step_info: String,
    pub processed_count: i64,
    pub total_count: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub logs: Vec<LogEntry>,
    pub finished_list: Vec<FinishedItem>,
    pub error_list: Vec<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProgressPayload {
    pub fn new(total_count: i64) -> Self {
        Self {
            total_count,
            ..Self::default()
        }
    }

    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry {
            time: Utc::now(),
            level,
            message: message.into(),
        });
    }

    /// Attach task-specific metadata alongside the standard keys
    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn clear_extension(&mut self, key: &str) {
        self.extensions.remove(key);
    }
}
