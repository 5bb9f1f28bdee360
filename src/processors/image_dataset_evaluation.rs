//! Scores image datasets on the bounded worker pool.

use async_trait::async_trait;
use serde_json::json;

use super::dataset_evaluation::EVALUATION_INSTRUCTIONS;
use super::shared::{generate_text, item_context, parse_evaluation, records_to_items, TaskConfigView};
use crate::domain::ImageDatasetRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ExecutionMode, ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

pub struct ImageDatasetEvaluationProcessor {
    deps: ProcessorDeps,
}

impl ImageDatasetEvaluationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkItemProcessor for ImageDatasetEvaluationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::ImageDatasetEvaluation
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::BoundedParallel
    }

    fn step_label(&self) -> &'static str {
        "Evaluating image datasets"
    }

    fn empty_message(&self) -> &'static str {
        "No image datasets need evaluation"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let datasets = self
            .deps
            .repository
            .image_datasets_pending_evaluation(&task.project_id)
            .await?;
        records_to_items(&datasets, |d| (d.id.as_str(), d.image.name.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let dataset: ImageDatasetRecord = item.record()?;
        let (view, model) = item_context(task)?;

        let prompt = format!(
            "The attached image is \"{}\".\n\nQuestion: {}\n\nAnswer: {}\n\n{EVALUATION_INSTRUCTIONS} \
             Judge the answer against what the image shows. Write the justification in {}.",
            dataset.image.name,
            dataset.question,
            dataset.answer,
            view.language_label()
        );
        let request = GenerationRequest::text(prompt, model).with_image(&dataset.image.image_ref);
        let text = generate_text(self.deps.generation.as_ref(), request).await?;
        let evaluation = parse_evaluation(&text)?;
        let score = evaluation.score;

        self.deps
            .repository
            .save_image_dataset_evaluation(&task.project_id, &dataset.id, evaluation)
            .await?;

        Ok(ItemOutput::new()
            .with("datasetId", json!(dataset.id))
            .with("imageId", json!(dataset.image.id))
            .with("score", json!(score)))
    }
}
