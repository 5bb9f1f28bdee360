//! Rewrites noisy chunk text into clean prose.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, records_to_items, TaskConfigView};
use crate::domain::ChunkRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

pub struct DataCleaningProcessor {
    deps: ProcessorDeps,
}

impl DataCleaningProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

fn cleaning_prompt(content: &str, language: &str) -> String {
    format!(
        "Clean up the following text. Remove markup residue, page headers and footers, \
         broken line wraps and duplicated fragments. Keep every fact and do not summarize. \
         Reply in {language} with the cleaned text only.\n\n{content}"
    )
}

#[async_trait]
impl WorkItemProcessor for DataCleaningProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::DataCleaning
    }

    fn step_label(&self) -> &'static str {
        "Cleaning chunks"
    }

    fn empty_message(&self) -> &'static str {
        "No chunks need cleaning"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let chunks = self
            .deps
            .repository
            .chunks_pending_cleaning(&task.project_id)
            .await?;
        records_to_items(&chunks, |chunk| (chunk.id.as_str(), chunk.name.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let chunk: ChunkRecord = item.record()?;
        let (view, model) = item_context(task)?;

        let prompt = cleaning_prompt(&chunk.content, view.language_label());
        let cleaned = generate_text(self.deps.generation.as_ref(), GenerationRequest::text(prompt, model)).await?;

        let original_length = chunk.content.chars().count();
        let cleaned_length = cleaned.chars().count();
        self.deps
            .repository
            .update_chunk_content(&task.project_id, &chunk.id, cleaned)
            .await?;

        Ok(ItemOutput::new()
            .with("chunkId", json!(chunk.id))
            .with("chunkName", json!(chunk.name))
            .with("originalLength", json!(original_length))
            .with("cleanedLength", json!(cleaned_length)))
    }
}
