//! Builds a description dataset entry for each image that has none.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, records_to_items, TaskConfigView};
use crate::domain::ImageRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

pub struct ImageDatasetGenerationProcessor {
    deps: ProcessorDeps,
}

impl ImageDatasetGenerationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

pub(crate) fn describe_question(image_name: &str) -> String {
    format!("Describe this image: {image_name}")
}

#[async_trait]
impl WorkItemProcessor for ImageDatasetGenerationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::ImageDatasetGeneration
    }

    fn step_label(&self) -> &'static str {
        "Generating image datasets"
    }

    fn empty_message(&self) -> &'static str {
        "No images need a dataset"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let images = self
            .deps
            .repository
            .images_without_dataset(&task.project_id)
            .await?;
        records_to_items(&images, |image| (image.id.as_str(), image.name.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let image: ImageRecord = item.record()?;
        let (view, model) = item_context(task)?;

        let question = describe_question(&image.name);
        let prompt = format!(
            "{question}\n\nDescribe the attached image accurately and in detail, in {}.",
            view.language_label()
        );
        let request = GenerationRequest::text(prompt, model).with_image(&image.image_ref);
        let answer = generate_text(self.deps.generation.as_ref(), request).await?;

        let dataset_id = self
            .deps
            .repository
            .save_image_dataset(&task.project_id, &image.id, question, answer)
            .await?;

        Ok(ItemOutput::new()
            .with("imageId", json!(image.id))
            .with("imageName", json!(image.name))
            .with("datasetId", json!(dataset_id)))
    }
}
