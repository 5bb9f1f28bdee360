//! # Work Item Processors
//!
//! One [`WorkItemProcessor`](crate::orchestration::WorkItemProcessor) per task type.
//! Each processor lists the outstanding items of its task through the
//! [`DatasetRepository`](crate::domain::DatasetRepository), calls the generation
//! service for one item at a time and persists what it produced.

pub mod answer_generation;
pub mod data_cleaning;
pub mod data_distillation;
pub mod dataset_evaluation;
pub mod file_processing;
pub mod image_dataset_evaluation;
pub mod image_dataset_generation;
pub mod image_question_generation;
pub mod multi_turn_generation;
pub mod question_generation;
pub mod shared;

pub use answer_generation::AnswerGenerationProcessor;
pub use data_cleaning::DataCleaningProcessor;
pub use data_distillation::DataDistillationProcessor;
pub use dataset_evaluation::DatasetEvaluationProcessor;
pub use file_processing::{normalize_file_list, FileProcessingProcessor};
pub use image_dataset_evaluation::ImageDatasetEvaluationProcessor;
pub use image_dataset_generation::ImageDatasetGenerationProcessor;
pub use image_question_generation::ImageQuestionGenerationProcessor;
pub use multi_turn_generation::MultiTurnGenerationProcessor;
pub use question_generation::QuestionGenerationProcessor;
pub use shared::{extract_json, parse_evaluation, parse_string_list, TaskConfigView};
