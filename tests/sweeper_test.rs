//! Recovery sweeper against a live store: fail, re-dispatch, dry run and the
//! end-to-end path from a stalled task back to completion.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use common::{registry_with, runner_with, ScriptedProcessor, TaskFixture};
use tasker_batch::config::{SweeperConfig, TimeoutConfig};
use tasker_batch::constants::notes;
use tasker_batch::database::{InMemoryTaskStore, TaskStore};
use tasker_batch::error::{TaskerError, TaskerResult};
use tasker_batch::models::{TaskStatus, TaskType};
use tasker_batch::orchestration::{RecoverySweeper, SweepDecision, TaskDispatcher, TokioDispatcher};

#[derive(Default)]
struct RecordingDispatcher {
    dispatched: Mutex<Vec<Uuid>>,
    fail: bool,
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn dispatch(&self, task_id: Uuid) -> TaskerResult<()> {
        if self.fail {
            return Err(TaskerError::DispatchError("queue unavailable".to_string()));
        }
        self.dispatched.lock().unwrap().push(task_id);
        Ok(())
    }
}

fn sweeper(store: Arc<InMemoryTaskStore>) -> RecoverySweeper {
    RecoverySweeper::new(store, &TimeoutConfig::default(), SweeperConfig::default())
}

#[tokio::test]
async fn test_sweep_applies_policy_to_running_tasks() {
    let store = Arc::new(InMemoryTaskStore::new());
    let stalled = TaskFixture::running("answer-generation").started_ago(90).insert(&store);
    let dead = TaskFixture::running("answer-generation").started_ago(150).insert(&store);
    let zero_total = TaskFixture::running("file-processing")
        .total_count(0)
        .created_ago(120)
        .insert(&store);
    let never_started = TaskFixture::running("data-cleaning").created_ago(90).insert(&store);
    let no_timestamps = TaskFixture::running("data-cleaning").created_at(None).insert(&store);
    let healthy = TaskFixture::running("answer-generation").started_ago(10).insert(&store);
    let finished = TaskFixture::running("answer-generation")
        .started_ago(500)
        .status(TaskStatus::Completed)
        .insert(&store);

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let report = sweeper(store.clone())
        .with_dispatcher(dispatcher.clone())
        .sweep()
        .await
        .unwrap();

    assert_eq!(report.examined, 6);
    assert_eq!(report.failed.len(), 4);
    assert_eq!(report.redispatched, vec![stalled]);
    assert_eq!(*dispatcher.dispatched.lock().unwrap(), vec![stalled]);

    let dead_task = store.load(dead).await.unwrap();
    assert_eq!(dead_task.status, TaskStatus::Failed);
    assert_eq!(dead_task.note, notes::RUNNER_TIMEOUT);
    assert!(dead_task.end_time.is_some());

    assert_eq!(store.load(zero_total).await.unwrap().note, notes::SWEEP_ZERO_TOTAL);
    assert_eq!(store.load(never_started).await.unwrap().note, notes::SWEEP_NEVER_STARTED);
    assert_eq!(store.load(no_timestamps).await.unwrap().note, notes::SWEEP_NO_TIMESTAMPS);

    assert_eq!(store.load(stalled).await.unwrap().status, TaskStatus::Running);
    assert_eq!(store.load(healthy).await.unwrap().status, TaskStatus::Running);
    assert_eq!(store.load(finished).await.unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let store = Arc::new(InMemoryTaskStore::new());
    let dead = TaskFixture::running("answer-generation").started_ago(150).insert(&store);
    let stalled = TaskFixture::running("answer-generation").started_ago(90).insert(&store);
    let before = store.load(dead).await.unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let report = sweeper(store.clone())
        .with_dispatcher(dispatcher.clone())
        .with_dry_run(true)
        .sweep()
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.findings.len(), 2);
    assert!(report.failed.is_empty());
    assert!(dispatcher.dispatched.lock().unwrap().is_empty());
    assert_eq!(store.load(dead).await.unwrap(), before);
    assert!(report
        .findings
        .iter()
        .any(|f| f.task_id == stalled && f.decision == SweepDecision::Redispatch));
}

#[tokio::test]
async fn test_without_dispatcher_stalled_tasks_are_skipped() {
    let store = Arc::new(InMemoryTaskStore::new());
    let stalled = TaskFixture::running("answer-generation").started_ago(90).insert(&store);

    let report = sweeper(store.clone()).sweep().await.unwrap();

    assert_eq!(report.redispatch_skipped, vec![stalled]);
    assert!(report.redispatched.is_empty());
    assert_eq!(store.load(stalled).await.unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn test_dispatch_failure_is_counted_and_sweep_continues() {
    let store = Arc::new(InMemoryTaskStore::new());
    TaskFixture::running("answer-generation").started_ago(90).insert(&store);
    let dead = TaskFixture::running("answer-generation").started_ago(150).insert(&store);

    let dispatcher = Arc::new(RecordingDispatcher {
        fail: true,
        ..RecordingDispatcher::default()
    });
    let report = sweeper(store.clone())
        .with_dispatcher(dispatcher)
        .sweep()
        .await
        .unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.failed, vec![dead]);
}

#[tokio::test]
async fn test_redispatched_task_runs_to_completion() {
    let store = Arc::new(InMemoryTaskStore::new());
    let stalled = TaskFixture::running("question-generation").started_ago(90).insert(&store);

    let runner = Arc::new(runner_with(
        store.clone(),
        registry_with(ScriptedProcessor::succeeding(TaskType::QuestionGeneration, 2)),
    ));
    let report = sweeper(store.clone())
        .with_dispatcher(Arc::new(TokioDispatcher::new(runner)))
        .sweep()
        .await
        .unwrap();
    assert_eq!(report.redispatched, vec![stalled]);

    let mut status = TaskStatus::Running;
    for _ in 0..100 {
        status = store.load(stalled).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_shutdown() {
    let store = Arc::new(InMemoryTaskStore::new());
    let dead = TaskFixture::running("answer-generation").started_ago(150).insert(&store);
    let config = SweeperConfig {
        interval_seconds: 60,
        ..SweeperConfig::default()
    };
    let sweeper = RecoverySweeper::new(store.clone(), &TimeoutConfig::default(), config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    // The first tick fires immediately
    tokio::time::sleep(StdDuration::from_secs(1)).await;
    assert_eq!(store.load(dead).await.unwrap().status, TaskStatus::Failed);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
