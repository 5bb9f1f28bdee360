//! Generates questions for text chunks that have none yet.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, parse_string_list, records_to_items, TaskConfigView};
use crate::constants::config_keys;
use crate::domain::ChunkRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

const DEFAULT_QUESTION_COUNT: usize = 5;

pub struct QuestionGenerationProcessor {
    deps: ProcessorDeps,
}

impl QuestionGenerationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

pub(crate) fn question_prompt(content: &str, count: usize, language: &str) -> String {
    format!(
        "Read the following text and write {count} distinct questions that can be answered \
         from it alone. Write the questions in {language}. Respond with a JSON array of strings.\n\n\
         Text:\n{content}"
    )
}

#[async_trait]
impl WorkItemProcessor for QuestionGenerationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::QuestionGeneration
    }

    fn step_label(&self) -> &'static str {
        "Generating questions"
    }

    fn empty_message(&self) -> &'static str {
        "No text chunks need questions"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let chunks = self
            .deps
            .repository
            .chunks_without_questions(&task.project_id)
            .await?;
        records_to_items(&chunks, |chunk| (chunk.id.as_str(), chunk.name.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let chunk: ChunkRecord = item.record()?;
        let (view, model) = item_context(task)?;
        let count = view.count(config_keys::QUESTION_COUNT, DEFAULT_QUESTION_COUNT);

        let prompt = question_prompt(&chunk.content, count, view.language_label());
        let text = generate_text(self.deps.generation.as_ref(), GenerationRequest::text(prompt, model)).await?;
        let mut questions = parse_string_list(&text)?;
        questions.truncate(count);

        let saved = self
            .deps
            .repository
            .save_questions(&task.project_id, &chunk.id, questions)
            .await?;

        Ok(ItemOutput::new()
            .with("chunkId", json!(chunk.id))
            .with("chunkName", json!(chunk.name))
            .with("questionsCount", json!(saved))
            .tally_count("totalQuestions", saved)
            .message(format!("Generated {saved} questions for {}", chunk.name)))
    }
}
