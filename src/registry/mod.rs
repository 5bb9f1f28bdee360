//! # Registry Infrastructure
//!
//! Resolution of task type tags to work item processors.
//!
//! ## Architecture
//!
//! ```text
//! ProcessorRegistry
//! ├── "question-generation"      → QuestionGenerationProcessor
//! ├── "answer-generation"        → AnswerGenerationProcessor
//! ├── ...
//! └── "image-dataset-evaluation" → ImageDatasetEvaluationProcessor
//! ```
//!
//! The registry is built once at startup and shared read-only by every task runner.

pub mod processor_registry;

pub use processor_registry::{ProcessorDeps, ProcessorRegistry};
