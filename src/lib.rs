//! # taskpool
//!
//! Bounded parallel execution of fallible tasks with error-threshold
//! cancellation.
//!
//! ## Overview
//!
//! A batch of independent tasks is spread over a fixed number of workers. Each
//! failing task bumps a shared counter; once the counter reaches the configured
//! limit no new task is started, tasks already running are allowed to finish,
//! and the call reports [`ExecutorError::ErrorsLimitExceeded`].
//!
//! ## Quick Start
//!
//! ```rust
//! use taskpool::pool::{execute, task, TaskError};
//!
//! # async fn example() -> taskpool::Result<()> {
//! let tasks = vec![
//!     task(|| Ok(())),
//!     task(|| Err(TaskError::failed("disk full"))),
//!     task(|| Ok(())),
//! ];
//!
//! // 2 workers, abort after 2 failures
//! execute(tasks, 2, 2).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`pool`]: Executor, task types and per-run state
//! - [`metrics`]: Prometheus counters for runs and tasks

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Main error type for executor operations
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Worker count was not positive; nothing was started
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Failed tasks reached the configured limit; the batch was abandoned
    #[error("Errors limit exceeded: {failures} failures, limit {limit}")]
    ErrorsLimitExceeded {
        /// Configured failure threshold
        limit: usize,
        /// Failures observed when the run ended
        failures: usize,
    },

    /// Pool stopped before every task started without reaching the limit
    #[error("Run incomplete: {started} of {total} tasks started")]
    Incomplete {
        /// Tasks that started
        started: usize,
        /// Tasks submitted
        total: usize,
    },

    /// Runtime for the blocking entry point could not be built
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Worker pool, task types and run state
pub mod pool;

/// Prometheus metrics for executor runs
pub mod metrics;

pub use pool::{execute, run, task, ExecutorConfig, ParallelExecutor, RunReport, Task, TaskError};
