//! Shared test fixtures: scripted processors, a mock generation client, an in-memory
//! dataset repository and a flaky store wrapper.

#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use tasker_batch::config::TaskerBatchConfig;
use tasker_batch::database::{InMemoryTaskStore, TaskStore};
use tasker_batch::models::{NewTask, ProgressPayload, Task, TaskStatus, TaskType};
use tasker_batch::orchestration::{BatchExecutor, TaskRunner};
use tasker_batch::registry::ProcessorRegistry;

pub use mocks::{Behavior, FlakyStore, MockDatasetRepository, MockGenerationClient, ScriptedProcessor};

/// Configuration with short backoffs for tests
pub fn test_config() -> TaskerBatchConfig {
    let mut config = TaskerBatchConfig::default();
    config.runner.retry_backoff_seconds = 1;
    config.generation.max_retries = 0;
    config.generation.retry_delay_ms = 1;
    config
}

pub fn model_config() -> Value {
    json!({"model": {"modelName": "test-model", "provider": "mock"}, "language": "en"})
}

pub fn runner_with(store: Arc<dyn TaskStore>, registry: ProcessorRegistry) -> TaskRunner {
    let config = test_config();
    let executor = BatchExecutor::new(store.clone(), config.executor.clone());
    TaskRunner::new(store, Arc::new(registry), executor, &config)
}

pub fn registry_with(processor: ScriptedProcessor) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(processor));
    registry
}

pub async fn create_task(store: &InMemoryTaskStore, task_type: TaskType, config: Value) -> Uuid {
    store
        .create(NewTask::new("project-1", task_type, config))
        .await
        .expect("create task")
        .id
}

/// Builder for historical task rows seeded straight into the store
pub struct TaskFixture {
    task: Task,
}

impl TaskFixture {
    pub fn running(task_type: &str) -> Self {
        let now = Utc::now();
        Self {
            task: Task {
                id: Uuid::new_v4(),
                project_id: "project-1".to_string(),
                task_type: task_type.to_string(),
                status: TaskStatus::Running,
                start_time: None,
                end_time: None,
                total_count: 10,
                completed_count: 0,
                config: json!({}),
                detail: ProgressPayload::default(),
                note: String::new(),
                created_at: Some(now),
                updated_at: now,
            },
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn started_ago(mut self, minutes: i64) -> Self {
        self.task.start_time = Some(Utc::now() - Duration::minutes(minutes));
        self
    }

    pub fn created_ago(mut self, minutes: i64) -> Self {
        self.task.created_at = Some(Utc::now() - Duration::minutes(minutes));
        self
    }

    pub fn created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn total_count(mut self, total: i64) -> Self {
        self.task.total_count = total;
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.task.config = config;
        self
    }

    pub fn note(mut self, note: &str) -> Self {
        self.task.note = note.to_string();
        self
    }

    pub fn insert(self, store: &InMemoryTaskStore) -> Uuid {
        let id = self.task.id;
        store.insert_task(self.task);
        id
    }
}
