//! # Recovery Sweeper
//!
//! Periodic background service that heals tasks left running by crashed or stalled
//! workers.
//!
//! ## Sweep Policy
//!
//! Each running task is classified in this order:
//!
//! 1. `total_count == 0` and created more than the anomaly threshold ago → failed;
//!    `total_count == 0` with no creation time → failed
//! 2. `start_time` older than the task timeout → failed
//! 3. `start_time` older than the stall threshold → re-dispatched
//! 4. no `start_time` and created more than the anomaly threshold ago → failed
//! 5. no `start_time` and no creation time → failed
//! 6. anything else is left alone
//!
//! Failures go through the guarded store write, so a task that finishes between the
//! scan and the write keeps its own terminal status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dispatcher::TaskDispatcher;
use crate::config::{SweeperConfig, TimeoutConfig};
use crate::constants::notes;
use crate::database::TaskStore;
use crate::error::TaskerResult;
use crate::models::{SaveOutcome, Task, TaskStatus, TaskUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepDecision {
    /// Mark the task failed with the given note
    Fail(String),
    /// Hand the task back to a runner
    Redispatch,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepThresholds {
    pub task_timeout: Duration,
    pub stall_threshold: Duration,
    pub anomaly_threshold: Duration,
}

impl From<&TimeoutConfig> for SweepThresholds {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            task_timeout: config.task_timeout(),
            stall_threshold: config.stall_threshold(),
            anomaly_threshold: config.anomaly_threshold(),
        }
    }
}

impl Default for SweepThresholds {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Apply the sweep policy to one running task
pub fn classify(task: &Task, now: DateTime<Utc>, thresholds: &SweepThresholds) -> SweepDecision {
    if task.total_count == 0 {
        match task.age(now) {
            Some(age) if age > thresholds.anomaly_threshold => {
                return SweepDecision::Fail(notes::SWEEP_ZERO_TOTAL.to_string());
            }
            None => return SweepDecision::Fail(notes::SWEEP_ZERO_TOTAL_NO_CREATED_AT.to_string()),
            Some(_) => {}
        }
    }

    if let Some(running_for) = task.running_for(now) {
        if running_for > thresholds.task_timeout {
            return SweepDecision::Fail(notes::RUNNER_TIMEOUT.to_string());
        }
        if running_for > thresholds.stall_threshold {
            return SweepDecision::Redispatch;
        }
        return SweepDecision::Leave;
    }

    match task.age(now) {
        Some(age) if age > thresholds.anomaly_threshold => {
            SweepDecision::Fail(notes::SWEEP_NEVER_STARTED.to_string())
        }
        Some(_) => SweepDecision::Leave,
        None => SweepDecision::Fail(notes::SWEEP_NO_TIMESTAMPS.to_string()),
    }
}

/// A task the sweeper decided to act on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFinding {
    pub task_id: Uuid,
    pub task_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub decision: SweepDecision,
}

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub dry_run: bool,
    pub findings: Vec<SweepFinding>,
    pub failed: Vec<Uuid>,
    pub redispatched: Vec<Uuid>,
    /// Re-dispatch decisions not acted on because no dispatcher is attached
    pub redispatch_skipped: Vec<Uuid>,
    /// Tasks that became terminal on their own before the failure write
    pub already_terminal: Vec<Uuid>,
    pub errors: usize,
}

pub struct RecoverySweeper {
    store: Arc<dyn TaskStore>,
    dispatcher: Option<Arc<dyn TaskDispatcher>>,
    thresholds: SweepThresholds,
    config: SweeperConfig,
}

impl std::fmt::Debug for RecoverySweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoverySweeper")
            .field("thresholds", &self.thresholds)
            .field("config", &self.config)
            .field("has_dispatcher", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

impl RecoverySweeper {
    pub fn new(store: Arc<dyn TaskStore>, timeouts: &TimeoutConfig, config: SweeperConfig) -> Self {
        Self {
            store,
            dispatcher: None,
            thresholds: SweepThresholds::from(timeouts),
            config,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_thresholds(mut self, thresholds: SweepThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn thresholds(&self) -> &SweepThresholds {
        &self.thresholds
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Classify every running task without acting on any of them
    pub async fn plan(&self, now: DateTime<Utc>) -> TaskerResult<(usize, Vec<SweepFinding>)> {
        let running = self.store.list_running().await?;
        let examined = running.len();
        let findings = running
            .iter()
            .filter_map(|task| match classify(task, now, &self.thresholds) {
                SweepDecision::Leave => None,
                decision => Some(SweepFinding {
                    task_id: task.id,
                    task_type: task.task_type.clone(),
                    start_time: task.start_time,
                    created_at: task.created_at,
                    decision,
                }),
            })
            .collect();
        Ok((examined, findings))
    }

    /// Run one sweep cycle as of now
    pub async fn sweep(&self) -> TaskerResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep cycle as of `now`
    #[instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> TaskerResult<SweepReport> {
        let (examined, findings) = self.plan(now).await?;
        let mut report = SweepReport {
            examined,
            dry_run: self.config.dry_run,
            ..SweepReport::default()
        };

        if self.config.dry_run {
            for finding in &findings {
                info!(
                    task_id = %finding.task_id,
                    task_type = %finding.task_type,
                    decision = ?finding.decision,
                    "🔍 DRY RUN: sweep decision"
                );
            }
            report.findings = findings;
            return Ok(report);
        }

        for finding in &findings {
            match &finding.decision {
                SweepDecision::Fail(note) => self.fail(finding, note, &mut report).await,
                SweepDecision::Redispatch => self.redispatch(finding, &mut report).await,
                SweepDecision::Leave => {}
            }
        }
        report.findings = findings;

        if report.failed.is_empty() && report.redispatched.is_empty() {
            debug!(examined, "No tasks needed recovery this cycle");
        } else {
            info!(
                examined,
                failed = report.failed.len(),
                redispatched = report.redispatched.len(),
                redispatch_skipped = report.redispatch_skipped.len(),
                "🧹 Recovery sweep completed"
            );
        }
        Ok(report)
    }

    async fn fail(&self, finding: &SweepFinding, note: &str, report: &mut SweepReport) {
        let update = TaskUpdate::new().status(TaskStatus::Failed).note(note);
        match self.store.save(finding.task_id, update).await {
            Ok(SaveOutcome::Applied) => {
                warn!(task_id = %finding.task_id, note = %note, "Marked task failed");
                report.failed.push(finding.task_id);
            }
            Ok(SaveOutcome::TerminalPreserved) => {
                debug!(task_id = %finding.task_id, "Task finished before sweep write");
                report.already_terminal.push(finding.task_id);
            }
            Err(e) => {
                error!(task_id = %finding.task_id, error = %e, "Failed to mark task failed");
                report.errors += 1;
            }
        }
    }

    async fn redispatch(&self, finding: &SweepFinding, report: &mut SweepReport) {
        let Some(dispatcher) = &self.dispatcher else {
            warn!(
                task_id = %finding.task_id,
                "Task appears stalled but no dispatcher is attached, leaving it running"
            );
            report.redispatch_skipped.push(finding.task_id);
            return;
        };

        match dispatcher.dispatch(finding.task_id).await {
            Ok(()) => {
                info!(task_id = %finding.task_id, "🔁 Re-dispatched stalled task");
                report.redispatched.push(finding.task_id);
            }
            Err(e) => {
                error!(task_id = %finding.task_id, error = %e, "Failed to re-dispatch task");
                report.errors += 1;
            }
        }
    }

    /// Sweep on the configured interval until `shutdown` flips to true.
    ///
    /// A failed cycle is logged and the loop continues.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(self.config.interval());

        info!(
            interval_seconds = self.config.interval_seconds,
            dry_run = self.config.dry_run,
            "Starting recovery sweeper"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Recovery sweep cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Recovery sweeper shutting down");
                        return;
                    }
                }
            }
        }
    }
}
