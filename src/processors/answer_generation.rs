//! Answers unanswered text questions and stores each answer as a dataset entry.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, records_to_items, TaskConfigView};
use crate::domain::QuestionRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

pub struct AnswerGenerationProcessor {
    deps: ProcessorDeps,
}

impl AnswerGenerationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

fn answer_prompt(question: &QuestionRecord, language: &str) -> String {
    let mut prompt = String::new();
    if !question.context.trim().is_empty() {
        prompt.push_str("Reference text:\n");
        prompt.push_str(&question.context);
        prompt.push_str("\n\n");
    }
    if let Some(label) = question.label.as_deref().filter(|l| !l.is_empty()) {
        prompt.push_str(&format!("Topic: {label}\n"));
    }
    prompt.push_str(&format!(
        "Answer the question below accurately and completely in {language}, using only \
         the reference text when one is given.\n\nQuestion: {}",
        question.question
    ));
    prompt
}

#[async_trait]
impl WorkItemProcessor for AnswerGenerationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::AnswerGeneration
    }

    fn step_label(&self) -> &'static str {
        "Generating answers"
    }

    fn empty_message(&self) -> &'static str {
        "No unanswered questions found"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let questions = self
            .deps
            .repository
            .unanswered_questions(&task.project_id)
            .await?;
        records_to_items(&questions, |q| (q.id.as_str(), q.question.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let question: QuestionRecord = item.record()?;
        let (view, model) = item_context(task)?;

        let prompt = answer_prompt(&question, view.language_label());
        let answer = generate_text(self.deps.generation.as_ref(), GenerationRequest::text(prompt, model)).await?;
        let answer_len = answer.chars().count();

        // Saving the answer also marks the question answered
        let dataset_id = self
            .deps
            .repository
            .save_answer(&task.project_id, &question.id, answer)
            .await?;

        Ok(ItemOutput::new()
            .with("questionId", json!(question.id))
            .with("datasetId", json!(dataset_id))
            .with("answerLength", json!(answer_len))
            .tally("totalAnswers", 1))
    }
}
