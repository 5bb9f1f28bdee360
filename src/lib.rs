#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Batch Core
//!
//! Durable, recoverable background task orchestration for batch generation workloads.
//!
//! ## Overview
//!
//! A task is one long-lived batch operation (generate questions for every chunk of a
//! project, evaluate every dataset, ...) made of many independent work items. Each work
//! item is one slow, unreliable call to a generation service plus the persistence of its
//! output. The core drives those items to completion, reports fine-grained progress for
//! polling UIs, honours cooperative cancellation, and heals itself after crashes through
//! a periodic recovery sweep.
//!
//! ## Architecture
//!
//! ```text
//! TaskService ──create──▶ TaskStore ◀──────────── RecoverySweeper
//!      │                     ▲                         │
//!      └──dispatch──▶ TaskRunner ──resolve──▶ ProcessorRegistry
//!                            │                         │
//!                            └──▶ BatchExecutor ──▶ WorkItemProcessor (x10)
//!                                      │                   │
//!                                ProgressReporter   GenerationClient / DatasetRepository
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Task record, status codes, task types, progress payload
//! - [`database`] - Task store contract with in-memory and PostgreSQL implementations
//! - [`orchestration`] - Runner, batch executor, progress reporter, recovery sweeper
//! - [`registry`] - Task type to work item processor resolution
//! - [`processors`] - The ten concrete work item processors
//! - [`generation`] - Generation service seam with timeout and retry wrapper
//! - [`domain`] - Dataset repository seam used by processors
//! - [`config`] - YAML + environment configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_batch::config::TaskerBatchConfig;
//! use tasker_batch::database::InMemoryTaskStore;
//! use tasker_batch::orchestration::{BatchExecutor, TaskRunner};
//! use tasker_batch::registry::ProcessorRegistry;
//!
//! # async fn example(registry: ProcessorRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TaskerBatchConfig::default();
//! let store = Arc::new(InMemoryTaskStore::new());
//! let executor = BatchExecutor::new(store.clone(), config.executor.clone());
//! let runner = TaskRunner::new(store, Arc::new(registry), executor, &config);
//! # let task_id = uuid::Uuid::new_v4();
//! let outcome = runner.run_with_retry(task_id).await?;
//! println!("task finished: {outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod domain;
pub mod error;
pub mod generation;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod processors;
pub mod registry;

pub use config::{ConfigManager, TaskerBatchConfig};
pub use database::{InMemoryTaskStore, PgTaskStore, SaveOutcome, TaskStore};
pub use error::{TaskerError, TaskerResult};
pub use models::{NewTask, ProgressPayload, Task, TaskStatus, TaskType, TaskUpdate};
pub use orchestration::{
    BatchExecutor, RecoverySweeper, RunOutcome, TaskDispatcher, TaskRunner, TaskService,
};
pub use registry::ProcessorRegistry;
