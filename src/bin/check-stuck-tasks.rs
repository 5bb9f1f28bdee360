//! # Stuck Task Checker
//!
//! One-shot recovery sweep from the command line. Lists running tasks that are dead or
//! anomalous and marks them failed; stalled tasks are reported but never re-dispatched
//! since this tool has no runner attached.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tasker_batch::config::ConfigManager;
use tasker_batch::logging;
use tasker_batch::database::{DatabaseConnection, PgTaskStore, TaskStore};
use tasker_batch::orchestration::{RecoverySweeper, SweepDecision, SweepThresholds};

#[derive(Parser)]
#[command(name = "check-stuck-tasks")]
#[command(about = "Find and fail batch tasks that are stuck in the running state")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Only report what would change
    #[arg(long)]
    dry_run: bool,

    /// Running time in hours after which a started task is considered dead
    #[arg(long, default_value_t = 2)]
    hours: i64,

    /// Configuration directory (default: ./config)
    #[arg(short, long, env = "TASKER_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // -v overrides the configured logging with a plain console subscriber
    if cli.verbose > 0 {
        let level = match cli.verbose {
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let _subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .try_init();
    }

    if cli.hours <= 0 {
        anyhow::bail!("--hours must be positive, got {}", cli.hours);
    }

    let manager = ConfigManager::load_from_directory(cli.config_dir.clone())
        .context("failed to load configuration")?;
    let config = manager.config();
    if cli.verbose == 0 {
        logging::init_with_config(&config.logging);
    }

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to the task database")?;
    if !connection.health_check().await? {
        anyhow::bail!("task database health check failed");
    }
    let pg_store = PgTaskStore::new(connection.pool().clone());
    pg_store.ensure_schema().await?;
    let store: Arc<dyn TaskStore> = Arc::new(pg_store);

    let thresholds = SweepThresholds {
        task_timeout: Duration::hours(cli.hours),
        ..SweepThresholds::from(&config.timeouts)
    };
    let sweeper = RecoverySweeper::new(store, &config.timeouts, config.sweeper.clone())
        .with_thresholds(thresholds)
        .with_dry_run(cli.dry_run);

    println!("🔍 Checking for tasks running longer than {} hours...", cli.hours);
    let report = sweeper.sweep_at(Utc::now()).await?;

    let actionable: Vec<_> = report
        .findings
        .iter()
        .filter(|finding| finding.decision != SweepDecision::Leave)
        .collect();

    if actionable.is_empty() {
        println!("✅ No stuck tasks found ({} running tasks examined)", report.examined);
        connection.close().await;
        return Ok(());
    }

    println!("⚠️  Found {} stuck tasks:", actionable.len());
    for finding in &actionable {
        let created = finding
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let reason = match &finding.decision {
            SweepDecision::Fail(note) => note.as_str(),
            SweepDecision::Redispatch => "stalled, needs re-dispatch",
            SweepDecision::Leave => continue,
        };
        println!(
            "  - {} ({}), created {}: {}",
            finding.task_id, finding.task_type, created, reason
        );
    }

    if report.dry_run {
        println!("\n📋 Dry run, nothing was changed. Run without --dry-run to apply.");
    } else {
        println!(
            "\n🧹 Marked {} tasks failed, {} already finished, {} stalled left running, {} errors",
            report.failed.len(),
            report.already_terminal.len(),
            report.redispatch_skipped.len(),
            report.errors
        );
    }

    connection.close().await;
    if report.errors > 0 {
        anyhow::bail!("{} tasks could not be updated", report.errors);
    }
    Ok(())
}
