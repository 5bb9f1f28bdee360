mod common;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

use common::{create_task, test_config, Behavior, ScriptedProcessor};
use tasker_batch::database::{InMemoryTaskStore, TaskStore};
use tasker_batch::models::{NewTask, Task, TaskStatus, TaskType, TaskUpdate};
use tasker_batch::orchestration::{classify, final_status, BatchExecutor, SweepDecision, SweepThresholds};

fn status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Running),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Failed),
        Just(TaskStatus::Interrupted),
    ]
}

fn behavior_strategy() -> impl Strategy<Value = Behavior> {
    prop_oneof![
        3 => Just(Behavior::Succeed),
        2 => Just(Behavior::Fail("scripted failure")),
        1 => Just(Behavior::Panic),
    ]
}

fn started_task(total: i64, started_minutes_ago: i64) -> (Task, chrono::DateTime<Utc>) {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut task = Task::from_new(
        NewTask::new("p", TaskType::AnswerGeneration, json!({})).with_total_count(total),
        now - Duration::minutes(started_minutes_ago + 1),
    );
    task.start_time = Some(now - Duration::minutes(started_minutes_ago));
    (task, now)
}

proptest! {
    /// Property: a started task with items is failed past the timeout, re-dispatched past
    /// the stall threshold and otherwise left alone
    #[test]
    fn started_tasks_follow_elapsed_time_bands(total in 1i64..1000, minutes in 0i64..600) {
        let (task, now) = started_task(total, minutes);
        let decision = classify(&task, now, &SweepThresholds::default());

        let expected = if minutes > 120 {
            SweepDecision::Fail(tasker_batch::constants::notes::RUNNER_TIMEOUT.to_string())
        } else if minutes > 60 {
            SweepDecision::Redispatch
        } else {
            SweepDecision::Leave
        };
        prop_assert_eq!(decision, expected);
    }

    /// Property: a running task with neither start nor creation time is always failed
    #[test]
    fn tasks_without_timestamps_are_always_failed(total in 0i64..100) {
        let (mut task, now) = started_task(total, 0);
        task.start_time = None;
        task.created_at = None;
        let decision = classify(&task, now, &SweepThresholds::default());
        prop_assert!(matches!(decision, SweepDecision::Fail(_)));
    }

    /// Property: a batch fails only when nothing succeeded and something failed
    #[test]
    fn final_status_rule(success in 0usize..50, errors in 0usize..50) {
        let status = final_status(success, errors);
        prop_assert_eq!(status == TaskStatus::Failed, success == 0 && errors > 0);
    }

    /// Property: once terminal, a task's status and end time never change
    #[test]
    fn terminal_status_is_never_overwritten(first in status_strategy(), second in status_strategy()) {
        let now = Utc::now();
        let mut task = Task::from_new(NewTask::new("p", TaskType::DataCleaning, json!({})), now);

        TaskUpdate::new().status(first).apply_to(&mut task, now);
        let after_first = task.clone();
        TaskUpdate::new()
            .status(second)
            .apply_to(&mut task, now + Duration::seconds(5));

        if first.is_terminal() {
            prop_assert_eq!(task.status, first);
            prop_assert_eq!(task.end_time, after_first.end_time);
        } else {
            prop_assert_eq!(task.status, second);
        }
        prop_assert_eq!(task.end_time.is_some(), task.status.is_terminal());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: with a pool of N workers and M items every item is counted exactly once
    #[test]
    fn parallel_pool_accounts_for_every_item(
        behaviors in prop::collection::vec(behavior_strategy(), 1..40),
        pool_size in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let expected_success = behaviors.iter().filter(|b| matches!(b, Behavior::Succeed)).count();
        let total = behaviors.len();

        let (summary, stored) = runtime.block_on(async move {
            let store = Arc::new(InMemoryTaskStore::new());
            let task_id = create_task(
                &store,
                TaskType::DatasetEvaluation,
                json!({"concurrencyLimit": pool_size}),
            )
            .await;
            let task = store.load(task_id).await.unwrap();

            let processor = ScriptedProcessor::new(TaskType::DatasetEvaluation, behaviors).parallel();
            let executor = BatchExecutor::new(store.clone(), test_config().executor);
            let summary = executor.execute(&task, Arc::new(processor)).await.unwrap();
            (summary, store.load(task_id).await.unwrap())
        });

        prop_assert_eq!(summary.success_count + summary.error_count, total);
        prop_assert_eq!(summary.success_count, expected_success);
        prop_assert_eq!(stored.completed_count, total as i64);
        prop_assert_eq!(stored.detail.finished_list.len(), total);
        prop_assert_eq!(stored.status, final_status(summary.success_count, summary.error_count));
    }
}
