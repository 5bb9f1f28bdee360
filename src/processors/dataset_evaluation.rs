//! Scores question/answer datasets. Runs items on the bounded worker pool.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, parse_evaluation, records_to_items, TaskConfigView};
use crate::domain::DatasetRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ExecutionMode, ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

pub struct DatasetEvaluationProcessor {
    deps: ProcessorDeps,
}

impl DatasetEvaluationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

pub(crate) const EVALUATION_INSTRUCTIONS: &str = "Rate the answer from 0 to 5 for correctness, \
    completeness and relevance to the question. Respond with a JSON object \
    {\"score\": <number>, \"evaluation\": \"<short justification>\"}.";

fn evaluation_prompt(dataset: &DatasetRecord, language: &str) -> String {
    let context = dataset
        .context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Reference text:\n{c}\n\n"))
        .unwrap_or_default();
    format!(
        "{context}Question: {}\n\nAnswer: {}\n\n{EVALUATION_INSTRUCTIONS} Write the justification in {language}.",
        dataset.question, dataset.answer
    )
}

#[async_trait]
impl WorkItemProcessor for DatasetEvaluationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::DatasetEvaluation
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::BoundedParallel
    }

    fn step_label(&self) -> &'static str {
        "Evaluating datasets"
    }

    fn empty_message(&self) -> &'static str {
        "No datasets need evaluation"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let datasets = self
            .deps
            .repository
            .datasets_pending_evaluation(&task.project_id)
            .await?;
        records_to_items(&datasets, |d| (d.id.as_str(), d.question.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let dataset: DatasetRecord = item.record()?;
        let (view, model) = item_context(task)?;

        let prompt = evaluation_prompt(&dataset, view.language_label());
        let text = generate_text(self.deps.generation.as_ref(), GenerationRequest::text(prompt, model)).await?;
        let evaluation = parse_evaluation(&text)?;
        let score = evaluation.score;

        self.deps
            .repository
            .save_dataset_evaluation(&task.project_id, &dataset.id, evaluation)
            .await?;

        Ok(ItemOutput::new()
            .with("datasetId", json!(dataset.id))
            .with("score", json!(score)))
    }
}
