//! # Dataset Repository
//!
//! The seam through which work item processors read outstanding domain records and
//! persist what they produce. The relational store behind it is owned by the host
//! application; the orchestration core only depends on this trait.
//!
//! Every "read" method returns the records still outstanding for a project, so a task
//! that is re-run after a crash naturally resumes where it stopped. Implementations are
//! expected to make each write and its "done" marker atomic (for example saving an
//! answer and flagging its question as answered in one transaction); the core does not
//! deduplicate writes itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A text chunk split from a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question: String,
    pub label: Option<String>,
    /// Source text the question was generated from
    pub context: String,
    /// Present once the question has been answered
    pub answer: Option<String>,
}

/// A question/answer pair awaiting or holding an evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub name: String,
    /// Reference handed to the generation service (URL or data URI)
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDatasetRecord {
    pub id: String,
    pub image: ImageRecord,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A quality score in `[0, 5]` plus a free-text rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub comment: String,
}

/// Result of splitting one source file into chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub chunk_count: usize,
    pub toc: Option<String>,
}

/// Project-scoped access to the domain records the processors work on
#[async_trait]
pub trait DatasetRepository: Send + Sync {
    async fn chunks_without_questions(&self, project_id: &str) -> RepositoryResult<Vec<ChunkRecord>>;

    async fn save_questions(
        &self,
        project_id: &str,
        chunk_id: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize>;

    async fn unanswered_questions(&self, project_id: &str) -> RepositoryResult<Vec<QuestionRecord>>;

    /// Persist the answer and mark its question answered in one write. Returns the
    /// new dataset id.
    async fn save_answer(
        &self,
        project_id: &str,
        question_id: &str,
        answer: String,
    ) -> RepositoryResult<String>;

    /// Names of source files that already have chunks
    async fn split_files(&self, project_id: &str) -> RepositoryResult<Vec<String>>;

    async fn split_file(&self, project_id: &str, file_name: &str) -> RepositoryResult<SplitSummary>;

    async fn chunks_pending_cleaning(&self, project_id: &str) -> RepositoryResult<Vec<ChunkRecord>>;

    async fn update_chunk_content(
        &self,
        project_id: &str,
        chunk_id: &str,
        content: String,
    ) -> RepositoryResult<()>;

    async fn datasets_pending_evaluation(&self, project_id: &str) -> RepositoryResult<Vec<DatasetRecord>>;

    async fn save_dataset_evaluation(
        &self,
        project_id: &str,
        dataset_id: &str,
        evaluation: Evaluation,
    ) -> RepositoryResult<()>;

    async fn questions_without_conversation(
        &self,
        project_id: &str,
    ) -> RepositoryResult<Vec<QuestionRecord>>;

    async fn save_conversation(
        &self,
        project_id: &str,
        question_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> RepositoryResult<()>;

    /// Topics that already have distilled questions
    async fn distilled_topics(&self, project_id: &str) -> RepositoryResult<Vec<String>>;

    async fn save_distilled_questions(
        &self,
        project_id: &str,
        topic: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize>;

    async fn images_without_questions(&self, project_id: &str) -> RepositoryResult<Vec<ImageRecord>>;

    async fn save_image_questions(
        &self,
        project_id: &str,
        image_id: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize>;

    async fn images_without_dataset(&self, project_id: &str) -> RepositoryResult<Vec<ImageRecord>>;

    async fn save_image_dataset(
        &self,
        project_id: &str,
        image_id: &str,
        question: String,
        answer: String,
    ) -> RepositoryResult<String>;

    async fn image_datasets_pending_evaluation(
        &self,
        project_id: &str,
    ) -> RepositoryResult<Vec<ImageDatasetRecord>>;

    async fn save_image_dataset_evaluation(
        &self,
        project_id: &str,
        dataset_id: &str,
        evaluation: Evaluation,
    ) -> RepositoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = RepositoryError::not_found("Chunk", "c-1");
        assert_eq!(err.to_string(), "Chunk not found: c-1");
    }

    #[test]
    fn test_turn_role_serialization() {
        let turn = ConversationTurn {
            role: TurnRole::Assistant,
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
