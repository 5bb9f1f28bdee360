//! External task operations: create, poll, interrupt.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::dispatcher::TaskDispatcher;
use crate::constants::notes;
use crate::database::TaskStore;
use crate::error::{TaskerError, TaskerResult};
use crate::models::{NewTask, SaveOutcome, TaskSnapshot, TaskStatus, TaskType, TaskUpdate};

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    dispatcher: Arc<dyn TaskDispatcher>,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService").finish_non_exhaustive()
    }
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Persist a new running task and hand it to the dispatcher
    pub async fn create_task(&self, new_task: NewTask) -> TaskerResult<Uuid> {
        new_task
            .task_type
            .parse::<TaskType>()
            .map_err(|_| TaskerError::UnknownTaskType(new_task.task_type.clone()))?;
        if new_task.project_id.trim().is_empty() {
            return Err(TaskerError::ValidationError("project_id must not be empty".to_string()));
        }
        if !new_task.config.is_object() {
            return Err(TaskerError::ValidationError(
                "task config must be a JSON object".to_string(),
            ));
        }

        let task = self.store.create(new_task).await?;
        info!(task_id = %task.id, task_type = %task.task_type, project_id = %task.project_id, "📋 Task created");

        if let Err(e) = self.dispatcher.dispatch(task.id).await {
            // The task stays running; the recovery sweeper resolves it
            warn!(task_id = %task.id, error = %e, "Task created but dispatch failed");
        }
        Ok(task.id)
    }

    pub async fn poll(&self, task_id: Uuid) -> TaskerResult<TaskSnapshot> {
        let task = self.store.load(task_id).await?;
        Ok(TaskSnapshot::from(&task))
    }

    /// Request cooperative cancellation. Returns false if the task was already terminal.
    ///
    /// Status and note go out in one guarded write. The payload belongs to the running
    /// executor, which records where it stopped.
    pub async fn interrupt(&self, task_id: Uuid) -> TaskerResult<bool> {
        let update = TaskUpdate::new()
            .status(TaskStatus::Interrupted)
            .note(notes::INTERRUPTED);
        if self.store.save(task_id, update).await? == SaveOutcome::TerminalPreserved {
            return Ok(false);
        }

        info!(task_id = %task_id, "⏹️ Task interrupt requested");
        Ok(true)
    }
}
