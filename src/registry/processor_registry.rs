use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::domain::DatasetRepository;
use crate::error::{TaskerError, TaskerResult};
use crate::generation::{GenerationClient, RetryingGenerationClient};
use crate::models::TaskType;
use crate::orchestration::WorkItemProcessor;
use crate::processors::{
    AnswerGenerationProcessor, DataCleaningProcessor, DataDistillationProcessor,
    DatasetEvaluationProcessor, FileProcessingProcessor, ImageDatasetEvaluationProcessor,
    ImageDatasetGenerationProcessor, ImageQuestionGenerationProcessor, MultiTurnGenerationProcessor,
    QuestionGenerationProcessor,
};

/// Collaborators shared by the built-in processors
#[derive(Clone)]
pub struct ProcessorDeps {
    pub generation: Arc<dyn GenerationClient>,
    pub repository: Arc<dyn DatasetRepository>,
}

impl ProcessorDeps {
    /// Dependencies whose generation calls are bounded by the configured timeout and
    /// retried on transient failures
    pub fn with_retry(
        generation: Arc<dyn GenerationClient>,
        repository: Arc<dyn DatasetRepository>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            generation: Arc::new(RetryingGenerationClient::new(generation, config.clone())),
            repository,
        }
    }
}

/// Task type → processor lookup
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<TaskType, Arc<dyn WorkItemProcessor>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("task_types", &self.registered_types())
            .finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all ten built-in processors
    pub fn with_defaults(deps: ProcessorDeps) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(QuestionGenerationProcessor::new(deps.clone())));
        registry.register(Arc::new(AnswerGenerationProcessor::new(deps.clone())));
        registry.register(Arc::new(FileProcessingProcessor::new(deps.clone())));
        registry.register(Arc::new(DataCleaningProcessor::new(deps.clone())));
        registry.register(Arc::new(DatasetEvaluationProcessor::new(deps.clone())));
        registry.register(Arc::new(MultiTurnGenerationProcessor::new(deps.clone())));
        registry.register(Arc::new(DataDistillationProcessor::new(deps.clone())));
        registry.register(Arc::new(ImageQuestionGenerationProcessor::new(deps.clone())));
        registry.register(Arc::new(ImageDatasetGenerationProcessor::new(deps.clone())));
        registry.register(Arc::new(ImageDatasetEvaluationProcessor::new(deps)));
        registry
    }

    /// Register a processor under its own task type, returning any processor it replaced
    pub fn register(
        &mut self,
        processor: Arc<dyn WorkItemProcessor>,
    ) -> Option<Arc<dyn WorkItemProcessor>> {
        let task_type = processor.task_type();
        debug!(task_type = %task_type, mode = ?processor.execution_mode(), "Registered processor");
        self.processors.insert(task_type, processor)
    }

    /// Resolve a stored task type tag
    pub fn resolve(&self, task_type: &str) -> TaskerResult<Arc<dyn WorkItemProcessor>> {
        let parsed: TaskType = task_type
            .parse()
            .map_err(|_| TaskerError::UnknownTaskType(task_type.to_string()))?;
        self.get(parsed)
            .ok_or_else(|| TaskerError::UnknownTaskType(task_type.to_string()))
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn WorkItemProcessor>> {
        self.processors.get(&task_type).cloned()
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.processors.contains_key(&task_type)
    }

    /// Registered task types in declaration order
    pub fn registered_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|task_type| self.processors.contains_key(task_type))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
