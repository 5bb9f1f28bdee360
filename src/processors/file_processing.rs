//! Splits the uploaded files listed in the task configuration into chunks.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::constants::config_keys;
use crate::error::{TaskerError, TaskerResult};
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

/// Domain tree action under which an empty file list is acceptable
const KEEP_DOMAIN_TREE: &str = "keep";

pub struct FileProcessingProcessor {
    deps: ProcessorDeps,
}

impl FileProcessingProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

/// File names from the task configuration.
///
/// Entries are plain strings or objects carrying `fileName`, `file_name` or `name`;
/// anything else is skipped. Duplicates keep their first position.
pub fn normalize_file_list(config: &Value) -> Vec<String> {
    let raw = config
        .get(config_keys::FILE_LIST)
        .or_else(|| config.get(config_keys::FILE_LIST_LEGACY))
        .and_then(Value::as_array);

    let mut seen = HashSet::new();
    raw.into_iter()
        .flatten()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => ["fileName", "file_name", "name"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl WorkItemProcessor for FileProcessingProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::FileProcessing
    }

    fn step_label(&self) -> &'static str {
        "Splitting files"
    }

    fn empty_message(&self) -> &'static str {
        "No files left to split"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        let files = normalize_file_list(&task.config);
        if files.is_empty() {
            let action = task
                .config_value(config_keys::DOMAIN_TREE_ACTION)
                .and_then(Value::as_str)
                .unwrap_or("rebuild");
            if action == KEEP_DOMAIN_TREE {
                return Ok(Vec::new());
            }
            return Err(TaskerError::processor(
                &task.task_type,
                "File list is empty and the domain tree is not kept",
            ));
        }

        let already_split: HashSet<String> = self
            .deps
            .repository
            .split_files(&task.project_id)
            .await?
            .into_iter()
            .collect();

        let pending: Vec<WorkItem> = files
            .into_iter()
            .filter(|name| !already_split.contains(name))
            .map(|name| WorkItem::new(name.clone(), name.clone(), json!({ "fileName": name })))
            .collect();
        debug!(task_id = %task.id, pending = pending.len(), skipped = already_split.len(), "Resolved file list");
        Ok(pending)
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let file_name = item
            .payload
            .get("fileName")
            .and_then(Value::as_str)
            .ok_or_else(|| ItemError::InvalidItem(format!("{}: missing fileName", item.id)))?;

        let summary = self.deps.repository.split_file(&task.project_id, file_name).await?;

        Ok(ItemOutput::new()
            .with("fileName", json!(file_name))
            .with("chunkCount", json!(summary.chunk_count))
            .with("hasToc", json!(summary.toc.is_some()))
            .tally_count("totalChunks", summary.chunk_count)
            .message(format!("Split {file_name} into {} chunks", summary.chunk_count)))
    }
}
