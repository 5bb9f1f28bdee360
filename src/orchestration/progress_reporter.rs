//! # Progress Reporter
//!
//! Accumulates per-item outcomes into the task's [`ProgressPayload`] and flushes it to
//! the task store. One reporter exists per batch execution; in bounded-parallel mode it
//! sits behind a single async mutex so counters and store writes are serialized.
//!
//! Writes made here never carry a status except in [`ProgressReporter::finish`] and
//! [`ProgressReporter::complete_empty`], so a concurrent interrupt is never overwritten
//! by a progress flush. Once another writer has made the task terminal its note stays:
//! the store drops note writes on terminal tasks, and a finish that loses the race is
//! recorded as a stop in the payload instead of a completion.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::types::{ItemError, ItemOutput, WorkItem};
use crate::constants::notes;
use crate::database::TaskStore;
use crate::error::TaskerResult;
use crate::models::{FinishedItem, LogLevel, ProgressPayload, SaveOutcome, TaskStatus, TaskUpdate};

const CURRENT_KEY: &str = "current";

/// Final status rule: a batch fails only when every processed item failed
pub fn final_status(success_count: usize, error_count: usize) -> TaskStatus {
    if success_count == 0 && error_count > 0 {
        TaskStatus::Failed
    } else {
        TaskStatus::Completed
    }
}

/// Running note written with every flush
pub fn progress_note(processed: usize, total: usize, success: usize, error: usize) -> String {
    format!("Processed {processed}/{total}, succeeded {success}, failed {error}")
}

pub struct ProgressReporter {
    store: Arc<dyn TaskStore>,
    task_id: Uuid,
    step_label: String,
    payload: ProgressPayload,
    total: usize,
    success_count: usize,
    error_count: usize,
    stopped: Option<TaskStatus>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .field("total", &self.total)
            .field("success_count", &self.success_count)
            .field("error_count", &self.error_count)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn TaskStore>, task_id: Uuid, step_label: impl Into<String>) -> Self {
        Self {
            store,
            task_id,
            step_label: step_label.into(),
            payload: ProgressPayload::default(),
            total: 0,
            success_count: 0,
            error_count: 0,
            stopped: None,
        }
    }

    pub fn payload(&self) -> &ProgressPayload {
        &self.payload
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn processed(&self) -> usize {
        self.success_count + self.error_count
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Terminal status observed by a cancellation check, if any
    pub fn stopped(&self) -> Option<TaskStatus> {
        self.stopped
    }

    /// Remember that a cancellation check saw the task terminal
    pub fn note_stop(&mut self, observed: TaskStatus) {
        if self.stopped.is_none() {
            self.stopped = Some(observed);
        }
    }

    /// Initialise the payload for `total` items and flush it with the item count
    pub async fn begin(&mut self, total: usize) -> TaskerResult<()> {
        self.total = total;
        self.payload = ProgressPayload::new(to_i64(total));
        self.payload.step_info = format!("{}: starting", self.step_label);
        self.payload
            .push_log(LogLevel::Info, format!("{}: {total} item(s) to process", self.step_label));

        let update = TaskUpdate::new()
            .total_count(to_i64(total))
            .completed_count(0)
            .detail(self.payload.clone());
        self.store.save(self.task_id, update).await?;
        Ok(())
    }

    /// Mark `item` as the one being processed; `position` is 1-based
    pub fn set_current(&mut self, item: &WorkItem, position: usize) {
        self.payload.step_info = format!(
            "{} {position}/{}: {}",
            self.step_label,
            self.total,
            item.display_name()
        );
        self.payload.set_extension(
            CURRENT_KEY,
            json!({"itemId": item.id, "label": item.label}),
        );
        self.payload
            .push_log(LogLevel::Info, format!("Started: {}", item.display_name()));
    }

    pub fn record_success(&mut self, item: &WorkItem, output: ItemOutput) {
        self.success_count += 1;

        for (key, amount) in &output.tallies {
            let current = self.payload.extension(key).and_then(Value::as_i64).unwrap_or(0);
            self.payload.set_extension(key.clone(), json!(current + amount));
        }

        let message = match &output.message {
            Some(message) => format!("Finished: {}, {message}", item.display_name()),
            None => format!("Finished: {}", item.display_name()),
        };
        self.payload.push_log(LogLevel::Success, message);
        self.payload
            .finished_list
            .push(FinishedItem::success(&item.id, item.label.clone(), output.extra));
        self.refresh_counts();
    }

    pub fn record_error(&mut self, item: &WorkItem, error: &ItemError) {
        self.error_count += 1;

        let message = format!("Failed: {}, error: {error}", item.display_name());
        self.payload.error_list.push(message.clone());
        self.payload.push_log(LogLevel::Error, message);
        self.payload
            .finished_list
            .push(FinishedItem::failure(&item.id, item.label.clone(), error.to_string()));
        self.refresh_counts();
    }

    fn refresh_counts(&mut self) {
        self.payload.processed_count = to_i64(self.processed());
        self.payload.success_count = to_i64(self.success_count);
        self.payload.error_count = to_i64(self.error_count);
    }

    fn note(&self) -> String {
        progress_note(self.processed(), self.total, self.success_count, self.error_count)
    }

    /// Persist counters, payload and the running note
    pub async fn flush(&self) -> TaskerResult<SaveOutcome> {
        let update = TaskUpdate::new()
            .total_count(to_i64(self.total))
            .completed_count(to_i64(self.processed()))
            .detail(self.payload.clone())
            .note(self.note());
        self.store.save(self.task_id, update).await
    }

    /// Record a cooperative stop. The status is left as the external writer set it.
    pub async fn mark_stopped(&mut self, observed: TaskStatus) -> TaskerResult<()> {
        self.note_stop(observed);
        self.payload.clear_extension(CURRENT_KEY);
        self.payload.step_info = notes::STOPPED_EXTERNALLY.to_string();
        self.payload.push_log(
            LogLevel::Warning,
            format!("{} (status: {observed})", notes::STOPPED_EXTERNALLY),
        );

        let update = TaskUpdate::new()
            .completed_count(to_i64(self.processed()))
            .detail(self.payload.clone());
        self.store.save(self.task_id, update).await?;
        debug!(task_id = %self.task_id, status = %observed, "Recorded cooperative stop");
        Ok(())
    }

    /// Write the final status, payload and note
    pub async fn finish(&mut self) -> TaskerResult<(TaskStatus, SaveOutcome)> {
        let status = final_status(self.success_count, self.error_count);
        let partial = status == TaskStatus::Completed && self.error_count > 0;

        self.payload.clear_extension(CURRENT_KEY);
        let (step_info, level) = match (status, partial) {
            (TaskStatus::Failed, _) => (format!("{}: failed", self.step_label), LogLevel::Error),
            (_, true) => (
                format!("{}: partially failed", self.step_label),
                LogLevel::Warning,
            ),
            _ => (format!("{}: completed", self.step_label), LogLevel::Success),
        };
        self.payload.step_info = step_info.clone();
        self.payload.push_log(level, step_info);

        let note = if partial {
            format!("{}; partial failure", self.note())
        } else {
            self.note()
        };

        let update = TaskUpdate::new()
            .status(status)
            .total_count(to_i64(self.total))
            .completed_count(to_i64(self.processed()))
            .detail(self.payload.clone())
            .note(note);
        let outcome = self.store.save(self.task_id, update).await?;
        if outcome == SaveOutcome::TerminalPreserved {
            self.record_lost_finish().await?;
        }
        Ok((status, outcome))
    }

    /// The task turned terminal between the last cancellation check and the final
    /// write; overwrite the completion payload with a stop record
    async fn record_lost_finish(&mut self) -> TaskerResult<()> {
        let observed = self.store.load(self.task_id).await?.status;
        self.mark_stopped(observed).await
    }

    /// Finish a batch that had nothing to do
    pub async fn complete_empty(&mut self, message: &str) -> TaskerResult<SaveOutcome> {
        self.total = 0;
        self.payload = ProgressPayload::new(0);
        self.payload.step_info = message.to_string();
        self.payload.push_log(LogLevel::Info, message);

        let update = TaskUpdate::new()
            .status(TaskStatus::Completed)
            .total_count(0)
            .completed_count(0)
            .detail(self.payload.clone())
            .note(message);
        let outcome = self.store.save(self.task_id, update).await?;
        if outcome == SaveOutcome::TerminalPreserved {
            self.record_lost_finish().await?;
        }
        Ok(outcome)
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
