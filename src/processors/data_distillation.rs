//! Distills questions from configured topics without source documents.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::shared::{generate_text, item_context, parse_string_list, TaskConfigView};
use crate::constants::config_keys;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

const DEFAULT_QUESTIONS_PER_TOPIC: usize = 5;

pub struct DataDistillationProcessor {
    deps: ProcessorDeps,
}

impl DataDistillationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

fn configured_topics(config: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    config
        .get(config_keys::TOPICS)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|topic| !topic.is_empty() && seen.insert(topic.to_string()))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl WorkItemProcessor for DataDistillationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::DataDistillation
    }

    fn step_label(&self) -> &'static str {
        "Distilling topics"
    }

    fn empty_message(&self) -> &'static str {
        "No topics left to distill"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        let topics = configured_topics(&task.config);
        if topics.is_empty() {
            return Ok(Vec::new());
        }
        TaskConfigView::from_task(task)?.require_model(task)?;

        let done: HashSet<String> = self
            .deps
            .repository
            .distilled_topics(&task.project_id)
            .await?
            .into_iter()
            .collect();

        Ok(topics
            .into_iter()
            .filter(|topic| !done.contains(topic))
            .map(|topic| WorkItem::new(topic.clone(), topic.clone(), json!({ "topic": topic })))
            .collect())
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let topic = item
            .payload
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| ItemError::InvalidItem(format!("{}: missing topic", item.id)))?;
        let (view, model) = item_context(task)?;
        let count = view.count(config_keys::QUESTION_COUNT, DEFAULT_QUESTIONS_PER_TOPIC);

        let prompt = format!(
            "You are building a training dataset about \"{topic}\". Write {count} diverse, \
             self-contained questions a domain expert could answer without further context. \
             Write them in {}. Respond with a JSON array of strings.",
            view.language_label()
        );
        let text = generate_text(self.deps.generation.as_ref(), GenerationRequest::text(prompt, model)).await?;
        let mut questions = parse_string_list(&text)?;
        questions.truncate(count);

        let saved = self
            .deps
            .repository
            .save_distilled_questions(&task.project_id, topic, questions)
            .await?;

        Ok(ItemOutput::new()
            .with("topic", json!(topic))
            .with("questionsCount", json!(saved))
            .tally_count("totalQuestions", saved))
    }
}
