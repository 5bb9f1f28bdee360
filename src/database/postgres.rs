//! PostgreSQL task store.
//!
//! Tasks live in a single `batch_tasks` table. The terminal guard is a single
//! conditional `UPDATE`: the previous status is read with `FOR UPDATE` inside the same
//! statement, so the status/`end_time` decision and the write are atomic per row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TaskerError, TaskerResult};
use crate::models::{NewTask, ProgressPayload, SaveOutcome, Task, TaskStatus, TaskUpdate};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS batch_tasks (
    id UUID PRIMARY KEY,
    project_id TEXT NOT NULL,
    task_type TEXT NOT NULL,
    status SMALLINT NOT NULL DEFAULT 0 CHECK (status BETWEEN 0 AND 3),
    start_time TIMESTAMPTZ,
    end_time TIMESTAMPTZ,
    total_count BIGINT NOT NULL DEFAULT 0,
    completed_count BIGINT NOT NULL DEFAULT 0,
    config JSONB NOT NULL DEFAULT '{}'::jsonb,
    detail JSONB NOT NULL DEFAULT '{}'::jsonb,
    note TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_batch_tasks_running
    ON batch_tasks (created_at)
    WHERE status = 0;

CREATE INDEX IF NOT EXISTS idx_batch_tasks_project
    ON batch_tasks (project_id, task_type);
";

const TASK_COLUMNS: &str = "id, project_id, task_type, status, start_time, end_time, \
     total_count, completed_count, config, detail, note, created_at, updated_at";

const SAVE_SQL: &str = r"
WITH prev AS (
    SELECT id, status FROM batch_tasks WHERE id = $1 FOR UPDATE
)
UPDATE batch_tasks t SET
    status = CASE
        WHEN $2::SMALLINT IS NOT NULL AND prev.status = 0 THEN $2::SMALLINT
        ELSE t.status
    END,
    end_time = CASE
        WHEN $2::SMALLINT IS NOT NULL AND $2::SMALLINT <> 0 AND prev.status = 0 THEN NOW()
        ELSE t.end_time
    END,
    start_time = COALESCE($3::TIMESTAMPTZ, t.start_time),
    total_count = COALESCE($4::BIGINT, t.total_count),
    completed_count = COALESCE($5::BIGINT, t.completed_count),
    detail = COALESCE($6::JSONB, t.detail),
    note = CASE
        WHEN prev.status = 0 THEN COALESCE($7::TEXT, t.note)
        ELSE t.note
    END,
    updated_at = NOW()
FROM prev
WHERE t.id = prev.id
RETURNING prev.status AS previous_status
";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    project_id: String,
    task_type: String,
    status: i16,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    total_count: i64,
    completed_count: i64,
    config: serde_json::Value,
    detail: serde_json::Value,
    note: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_code(row.status).ok_or_else(|| {
            TaskerError::DatabaseError(format!(
                "Task {} has invalid status code {}",
                row.id, row.status
            ))
        })?;

        // A payload written by an older producer should not make the task unloadable
        let detail = serde_json::from_value::<ProgressPayload>(row.detail).unwrap_or_else(|e| {
            warn!(task_id = %row.id, error = %e, "Discarding unreadable progress payload");
            ProgressPayload::default()
        });

        Ok(Task {
            id: row.id,
            project_id: row.project_id,
            task_type: row.task_type,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            total_count: row.total_count,
            completed_count: row.completed_count,
            config: row.config,
            detail,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Task store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the task table and its indexes if they do not exist
    pub async fn ensure_schema(&self) -> TaskerResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        debug!("Ensured batch_tasks schema");
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, new_task: NewTask) -> TaskerResult<Task> {
        let task = Task::from_new(new_task, Utc::now());
        let detail = serde_json::to_value(&task.detail)?;

        let sql = format!(
            "INSERT INTO batch_tasks ({TASK_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task.id)
            .bind(&task.project_id)
            .bind(&task.task_type)
            .bind(task.status.code())
            .bind(task.start_time)
            .bind(task.end_time)
            .bind(task.total_count)
            .bind(task.completed_count)
            .bind(&task.config)
            .bind(detail)
            .bind(&task.note)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?;

        debug!(task_id = %row.id, task_type = %row.task_type, "Created task");
        Task::try_from(row)
    }

    async fn load(&self, id: Uuid) -> TaskerResult<Task> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM batch_tasks WHERE id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(TaskerError::TaskNotFound(id))?;
        Task::try_from(row)
    }

    async fn save(&self, id: Uuid, update: TaskUpdate) -> TaskerResult<SaveOutcome> {
        let detail = update
            .detail
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let previous_status: Option<i16> = sqlx::query_scalar(SAVE_SQL)
            .bind(id)
            .bind(update.status.map(TaskStatus::code))
            .bind(update.start_time)
            .bind(update.total_count)
            .bind(update.completed_count)
            .bind(detail)
            .bind(update.note.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        let previous_status = previous_status.ok_or(TaskerError::TaskNotFound(id))?;
        let was_terminal = previous_status != TaskStatus::Running.code();

        if update.status.is_some() && was_terminal {
            Ok(SaveOutcome::TerminalPreserved)
        } else {
            Ok(SaveOutcome::Applied)
        }
    }

    async fn list_running(&self) -> TaskerResult<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM batch_tasks WHERE status = 0 \
             ORDER BY created_at ASC NULLS FIRST"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Task::try_from).collect()
    }
}
