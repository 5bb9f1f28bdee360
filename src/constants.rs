//! # System Constants
//!
//! Operational boundaries of the batch orchestration core. Configuration defaults are
//! derived from these values, so a deployment without any configuration file behaves
//! exactly as described here.

// Re-export status types for convenience
pub use crate::models::{TaskStatus, TaskType};

/// Timing budgets shared by the task runner and the recovery sweeper
pub mod timing {
    /// A task running longer than this since `start_time` is considered dead
    pub const TASK_TIMEOUT_SECONDS: u64 = 2 * 60 * 60;

    /// A running task older than this since `start_time` is presumed stalled and re-dispatched
    pub const STALL_THRESHOLD_SECONDS: u64 = 60 * 60;

    /// A running task that never established a start time or item count within this
    /// window since creation is anomalous
    pub const ANOMALY_THRESHOLD_SECONDS: u64 = 60 * 60;

    /// Default interval between recovery sweeps
    pub const SWEEP_INTERVAL_SECONDS: u64 = 5 * 60;
}

/// Retry policy around a single task runner invocation
pub mod retry {
    /// Total attempts for one dispatch of the task runner
    pub const MAX_RUNNER_ATTEMPTS: u32 = 3;

    /// Fixed backoff between runner attempts
    pub const RUNNER_BACKOFF_SECONDS: u64 = 60;

    /// Retries applied to a single generation service call
    pub const GENERATION_MAX_RETRIES: u32 = 2;

    /// Delay between generation retries
    pub const GENERATION_RETRY_DELAY_MS: u64 = 1000;

    /// Per-call generation timeout
    pub const GENERATION_TIMEOUT_SECONDS: u64 = 120;
}

/// Worker pool sizing for bounded-parallel processors
pub mod pool {
    /// Concurrency used when neither the task nor the deployment configures one
    pub const DEFAULT_CONCURRENCY: usize = 2;

    /// Upper bound on any per-task concurrency override
    pub const MAX_CONCURRENCY: usize = 16;
}

/// Keys read from a task's opaque configuration blob
pub mod config_keys {
    pub const MODEL: &str = "model";
    pub const LANGUAGE: &str = "language";
    pub const CONCURRENCY_LIMIT: &str = "concurrencyLimit";
    pub const QUESTION_COUNT: &str = "questionCount";
    pub const ROUNDS: &str = "rounds";
    pub const FILE_LIST: &str = "fileList";
    pub const FILE_LIST_LEGACY: &str = "file_list";
    pub const DOMAIN_TREE_ACTION: &str = "domainTreeAction";
    pub const TOPICS: &str = "topics";
}

/// Human-readable notes written by the runner and sweeper
pub mod notes {
    pub const UNKNOWN_TASK_TYPE: &str = "Unknown task type";
    pub const RUNNER_TIMEOUT: &str =
        "Task timed out: running for more than the allowed budget, it may have stalled or failed";
    pub const SWEEP_ZERO_TOTAL: &str =
        "Task anomaly: totalCount is 0, the work list was probably empty at creation (detected automatically)";
    pub const SWEEP_ZERO_TOTAL_NO_CREATED_AT: &str =
        "Task anomaly: totalCount is 0 and the task has no creation time";
    pub const SWEEP_NEVER_STARTED: &str = "Task anomaly: no start time";
    pub const SWEEP_NO_TIMESTAMPS: &str = "Task anomaly: no start time and no creation time";
    pub const INTERRUPTED: &str = "Task interrupted by request";
    pub const STOPPED_EXTERNALLY: &str =
        "Task was stopped or failed externally, remaining items skipped";
}
