//! Generates questions about project images with the image attached to the request.

use async_trait::async_trait;
use serde_json::json;

use super::shared::{generate_text, item_context, parse_string_list, records_to_items, TaskConfigView};
use crate::constants::config_keys;
use crate::domain::ImageRecord;
use crate::error::TaskerResult;
use crate::generation::GenerationRequest;
use crate::models::{Task, TaskType};
use crate::orchestration::{ItemError, ItemOutput, WorkItem, WorkItemProcessor};
use crate::registry::ProcessorDeps;

const DEFAULT_IMAGE_QUESTION_COUNT: usize = 3;

pub struct ImageQuestionGenerationProcessor {
    deps: ProcessorDeps,
}

impl ImageQuestionGenerationProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkItemProcessor for ImageQuestionGenerationProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::ImageQuestionGeneration
    }

    fn step_label(&self) -> &'static str {
        "Generating image questions"
    }

    fn empty_message(&self) -> &'static str {
        "No images need questions"
    }

    async fn enumerate(&self, task: &Task) -> TaskerResult<Vec<WorkItem>> {
        TaskConfigView::from_task(task)?.require_model(task)?;
        let images = self
            .deps
            .repository
            .images_without_questions(&task.project_id)
            .await?;
        records_to_items(&images, |image| (image.id.as_str(), image.name.as_str()))
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let image: ImageRecord = item.record()?;
        let (view, model) = item_context(task)?;
        let count = view.count(config_keys::QUESTION_COUNT, DEFAULT_IMAGE_QUESTION_COUNT);

        let prompt = format!(
            "Look at the attached image \"{}\" and write {count} questions about what it shows. \
             Each question must be answerable from the image alone. Write them in {}. \
             Respond with a JSON array of strings.",
            image.name,
            view.language_label()
        );
        let request = GenerationRequest::text(prompt, model).with_image(&image.image_ref);
        let text = generate_text(self.deps.generation.as_ref(), request).await?;
        let mut questions = parse_string_list(&text)?;
        questions.truncate(count);

        let saved = self
            .deps
            .repository
            .save_image_questions(&task.project_id, &image.id, questions)
            .await?;

        Ok(ItemOutput::new()
            .with("imageId", json!(image.id))
            .with("imageName", json!(image.name))
            .with("questionsCount", json!(saved))
            .tally_count("totalQuestions", saved))
    }
}
