//! Mock collaborators for orchestration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use tasker_batch::constants::notes;
use tasker_batch::database::{InMemoryTaskStore, TaskStore};
use tasker_batch::domain::{
    ChunkRecord, ConversationTurn, DatasetRecord, DatasetRepository, Evaluation, ImageDatasetRecord,
    ImageRecord, QuestionRecord, RepositoryError, RepositoryResult, SplitSummary,
};
use tasker_batch::error::{TaskerError, TaskerResult};
use tasker_batch::generation::{
    GenerationClient, GenerationError, GenerationRequest, GenerationResponse,
};
use tasker_batch::models::{NewTask, SaveOutcome, Task, TaskStatus, TaskType, TaskUpdate};
use tasker_batch::orchestration::{
    ExecutionMode, ItemError, ItemOutput, WorkItem, WorkItemProcessor,
};

// ---------------------------------------------------------------------------
// Scripted processor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic,
    /// Succeed after sleeping this many milliseconds
    Delay(u64),
    /// Interrupt the owning task through the store, then succeed
    InterruptTask,
}

/// Processor whose items behave as scripted
pub struct ScriptedProcessor {
    task_type: TaskType,
    mode: ExecutionMode,
    behaviors: Vec<Behavior>,
    store: Option<Arc<dyn TaskStore>>,
    enumerate_error: Option<TaskerError>,
    pub processed: Arc<AtomicUsize>,
    pub enumerate_calls: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

impl ScriptedProcessor {
    pub fn new(task_type: TaskType, behaviors: Vec<Behavior>) -> Self {
        Self {
            task_type,
            mode: ExecutionMode::Sequential,
            behaviors,
            store: None,
            enumerate_error: None,
            processed: Arc::new(AtomicUsize::new(0)),
            enumerate_calls: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn succeeding(task_type: TaskType, count: usize) -> Self {
        Self::new(task_type, vec![Behavior::Succeed; count])
    }

    pub fn parallel(mut self) -> Self {
        self.mode = ExecutionMode::BoundedParallel;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn failing_enumerate(mut self, error: TaskerError) -> Self {
        self.enumerate_error = Some(error);
        self
    }

    async fn behave(&self, task: &Task, behavior: &Behavior) -> Result<ItemOutput, ItemError> {
        match behavior {
            Behavior::Succeed => Ok(ItemOutput::new().tally("totalQuestions", 2)),
            Behavior::Fail(message) => Err(ItemError::Parse((*message).to_string())),
            Behavior::Panic => panic!("scripted panic"),
            Behavior::Delay(ms) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(ItemOutput::new())
            }
            Behavior::InterruptTask => {
                if let Some(store) = &self.store {
                    store
                        .save(
                            task.id,
                            TaskUpdate::new()
                                .status(TaskStatus::Interrupted)
                                .note(notes::INTERRUPTED),
                        )
                        .await
                        .map_err(|e| ItemError::InvalidItem(e.to_string()))?;
                }
                Ok(ItemOutput::new())
            }
        }
    }
}

#[async_trait]
impl WorkItemProcessor for ScriptedProcessor {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn step_label(&self) -> &'static str {
        "Processing scripted items"
    }

    fn empty_message(&self) -> &'static str {
        "Nothing scripted"
    }

    async fn enumerate(&self, _task: &Task) -> TaskerResult<Vec<WorkItem>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.enumerate_error {
            return Err(error.clone());
        }
        Ok((0..self.behaviors.len())
            .map(|index| WorkItem::new(format!("item-{index}"), format!("Item {index}"), json!({ "index": index })))
            .collect())
    }

    async fn process_one(&self, task: &Task, item: &WorkItem) -> Result<ItemOutput, ItemError> {
        let index = item.payload["index"].as_u64().unwrap_or_default() as usize;
        let behavior = self.behaviors[index].clone();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);

        let in_flight = self.in_flight.clone();
        let _guard = InFlightGuard(in_flight);
        self.behave(task, &behavior).await
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Generation client
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// Generation client answering every request through a closure and recording requests
pub struct MockGenerationClient {
    responder: Box<Responder>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerationClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request).map(GenerationResponse::new)
    }
}

// ---------------------------------------------------------------------------
// Dataset repository
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RepositoryState {
    pub chunks: Vec<ChunkRecord>,
    pub chunk_questions: HashMap<String, Vec<String>>,
    pub cleaned_chunks: HashSet<String>,
    pub questions: Vec<QuestionRecord>,
    pub answers: HashMap<String, String>,
    pub split_files: Vec<String>,
    pub file_chunk_counts: HashMap<String, usize>,
    pub datasets: Vec<DatasetRecord>,
    pub evaluations: HashMap<String, Evaluation>,
    pub conversations: HashMap<String, Vec<ConversationTurn>>,
    pub distilled: HashMap<String, Vec<String>>,
    pub images: Vec<ImageRecord>,
    pub image_questions: HashMap<String, Vec<String>>,
    pub image_datasets: HashMap<String, (String, String)>,
    pub image_dataset_records: Vec<ImageDatasetRecord>,
    pub image_evaluations: HashMap<String, Evaluation>,
    /// Record ids whose writes fail
    pub failing_ids: HashSet<String>,
}

/// Dataset repository backed by plain collections
#[derive(Debug, Default)]
pub struct MockDatasetRepository {
    pub state: Mutex<RepositoryState>,
}

impl MockDatasetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RepositoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, RepositoryState> {
        self.state.lock().unwrap()
    }

    fn check_write(state: &RepositoryState, id: &str) -> RepositoryResult<()> {
        if state.failing_ids.contains(id) {
            return Err(RepositoryError::Backend(format!("write rejected for {id}")));
        }
        Ok(())
    }
}

pub fn chunk(id: &str, name: &str, content: &str) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        name: name.to_string(),
        content: content.to_string(),
    }
}

pub fn question(id: &str, text: &str, answer: Option<&str>) -> QuestionRecord {
    QuestionRecord {
        id: id.to_string(),
        question: text.to_string(),
        label: None,
        context: format!("context for {id}"),
        answer: answer.map(str::to_string),
    }
}

pub fn image(id: &str, name: &str) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        name: name.to_string(),
        image_ref: format!("images/{name}"),
    }
}

#[async_trait]
impl DatasetRepository for MockDatasetRepository {
    async fn chunks_without_questions(&self, _project_id: &str) -> RepositoryResult<Vec<ChunkRecord>> {
        let state = self.state();
        Ok(state
            .chunks
            .iter()
            .filter(|c| !state.chunk_questions.contains_key(&c.id))
            .cloned()
            .collect())
    }

    async fn save_questions(
        &self,
        _project_id: &str,
        chunk_id: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize> {
        let mut state = self.state();
        Self::check_write(&state, chunk_id)?;
        let count = questions.len();
        state.chunk_questions.insert(chunk_id.to_string(), questions);
        Ok(count)
    }

    async fn unanswered_questions(&self, _project_id: &str) -> RepositoryResult<Vec<QuestionRecord>> {
        let state = self.state();
        Ok(state
            .questions
            .iter()
            .filter(|q| q.answer.is_none() && !state.answers.contains_key(&q.id))
            .cloned()
            .collect())
    }

    async fn save_answer(
        &self,
        _project_id: &str,
        question_id: &str,
        answer: String,
    ) -> RepositoryResult<String> {
        let mut state = self.state();
        Self::check_write(&state, question_id)?;
        state.answers.insert(question_id.to_string(), answer);
        Ok(format!("dataset-{question_id}"))
    }

    async fn split_files(&self, _project_id: &str) -> RepositoryResult<Vec<String>> {
        Ok(self.state().split_files.clone())
    }

    async fn split_file(&self, _project_id: &str, file_name: &str) -> RepositoryResult<SplitSummary> {
        let mut state = self.state();
        Self::check_write(&state, file_name)?;
        let chunk_count = state.file_chunk_counts.get(file_name).copied().unwrap_or(1);
        state.split_files.push(file_name.to_string());
        Ok(SplitSummary {
            chunk_count,
            toc: None,
        })
    }

    async fn chunks_pending_cleaning(&self, _project_id: &str) -> RepositoryResult<Vec<ChunkRecord>> {
        let state = self.state();
        Ok(state
            .chunks
            .iter()
            .filter(|c| !state.cleaned_chunks.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn update_chunk_content(
        &self,
        _project_id: &str,
        chunk_id: &str,
        content: String,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        Self::check_write(&state, chunk_id)?;
        let chunk = state
            .chunks
            .iter_mut()
            .find(|c| c.id == chunk_id)
            .ok_or_else(|| RepositoryError::not_found("chunk", chunk_id))?;
        chunk.content = content;
        state.cleaned_chunks.insert(chunk_id.to_string());
        Ok(())
    }

    async fn datasets_pending_evaluation(&self, _project_id: &str) -> RepositoryResult<Vec<DatasetRecord>> {
        let state = self.state();
        Ok(state
            .datasets
            .iter()
            .filter(|d| !state.evaluations.contains_key(&d.id))
            .cloned()
            .collect())
    }

    async fn save_dataset_evaluation(
        &self,
        _project_id: &str,
        dataset_id: &str,
        evaluation: Evaluation,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        Self::check_write(&state, dataset_id)?;
        state.evaluations.insert(dataset_id.to_string(), evaluation);
        Ok(())
    }

    async fn questions_without_conversation(
        &self,
        _project_id: &str,
    ) -> RepositoryResult<Vec<QuestionRecord>> {
        let state = self.state();
        Ok(state
            .questions
            .iter()
            .filter(|q| q.answer.is_some() && !state.conversations.contains_key(&q.id))
            .cloned()
            .collect())
    }

    async fn save_conversation(
        &self,
        _project_id: &str,
        question_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        Self::check_write(&state, question_id)?;
        state.conversations.insert(question_id.to_string(), turns);
        Ok(())
    }

    async fn distilled_topics(&self, _project_id: &str) -> RepositoryResult<Vec<String>> {
        Ok(self.state().distilled.keys().cloned().collect())
    }

    async fn save_distilled_questions(
        &self,
        _project_id: &str,
        topic: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize> {
        let mut state = self.state();
        Self::check_write(&state, topic)?;
        let count = questions.len();
        state.distilled.insert(topic.to_string(), questions);
        Ok(count)
    }

    async fn images_without_questions(&self, _project_id: &str) -> RepositoryResult<Vec<ImageRecord>> {
        let state = self.state();
        Ok(state
            .images
            .iter()
            .filter(|i| !state.image_questions.contains_key(&i.id))
            .cloned()
            .collect())
    }

    async fn save_image_questions(
        &self,
        _project_id: &str,
        image_id: &str,
        questions: Vec<String>,
    ) -> RepositoryResult<usize> {
        let mut state = self.state();
        Self::check_write(&state, image_id)?;
        let count = questions.len();
        state.image_questions.insert(image_id.to_string(), questions);
        Ok(count)
    }

    async fn images_without_dataset(&self, _project_id: &str) -> RepositoryResult<Vec<ImageRecord>> {
        let state = self.state();
        Ok(state
            .images
            .iter()
            .filter(|i| !state.image_datasets.contains_key(&i.id))
            .cloned()
            .collect())
    }

    async fn save_image_dataset(
        &self,
        _project_id: &str,
        image_id: &str,
        question: String,
        answer: String,
    ) -> RepositoryResult<String> {
        let mut state = self.state();
        Self::check_write(&state, image_id)?;
        state
            .image_datasets
            .insert(image_id.to_string(), (question, answer));
        Ok(format!("image-dataset-{image_id}"))
    }

    async fn image_datasets_pending_evaluation(
        &self,
        _project_id: &str,
    ) -> RepositoryResult<Vec<ImageDatasetRecord>> {
        let state = self.state();
        Ok(state
            .image_dataset_records
            .iter()
            .filter(|d| !state.image_evaluations.contains_key(&d.id))
            .cloned()
            .collect())
    }

    async fn save_image_dataset_evaluation(
        &self,
        _project_id: &str,
        dataset_id: &str,
        evaluation: Evaluation,
    ) -> RepositoryResult<()> {
        let mut state = self.state();
        Self::check_write(&state, dataset_id)?;
        state
            .image_evaluations
            .insert(dataset_id.to_string(), evaluation);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Flaky store
// ---------------------------------------------------------------------------

/// Store whose first `load` calls fail with a database error
pub struct FlakyStore {
    inner: InMemoryTaskStore,
    remaining_load_failures: AtomicUsize,
    pub load_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: InMemoryTaskStore, load_failures: usize) -> Self {
        Self {
            inner,
            remaining_load_failures: AtomicUsize::new(load_failures),
            load_calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryTaskStore {
        &self.inner
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn create(&self, new_task: NewTask) -> TaskerResult<Task> {
        self.inner.create(new_task).await
    }

    async fn load(&self, id: Uuid) -> TaskerResult<Task> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TaskerError::DatabaseError("connection reset".to_string()));
        }
        self.inner.load(id).await
    }

    async fn save(&self, id: Uuid, update: TaskUpdate) -> TaskerResult<SaveOutcome> {
        self.inner.save(id, update).await
    }

    async fn list_running(&self) -> TaskerResult<Vec<Task>> {
        self.inner.list_running().await
    }
}
