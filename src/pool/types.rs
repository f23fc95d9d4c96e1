//! Task, configuration and report types shared by the executor

use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ExecutorError, Result};

/// Failure value returned by a single task
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task reported a failure with a message
    #[error("task failed: {0}")]
    Failed(String),

    /// Any other error bubbled up from inside the task
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Shorthand for a message-only failure
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Other(err.into())
    }
}

/// Outcome of a single task as seen by the executor
pub type TaskResult = std::result::Result<(), TaskError>;

/// A unit of work. Runs once, on the blocking thread pool.
pub type Task = Box<dyn FnOnce() -> TaskResult + Send + 'static>;

/// Box a closure into a [`Task`]
pub fn task<F>(f: F) -> Task
where
    F: FnOnce() -> TaskResult + Send + 'static,
{
    Box::new(f)
}

/// Callback for progress updates: `(finished, total)`
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Executor configuration
///
/// Both fields are signed so that the sentinels of the call contract stay
/// representable: `workers <= 0` is rejected, `max_errors <= 0` means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of concurrent workers
    pub workers: i64,
    /// Failure count at which the run aborts; `<= 0` disables the limit
    pub max_errors: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get() as i64,
            max_errors: 0,
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration from raw values
    pub fn new(workers: i64, max_errors: i64) -> Self {
        Self { workers, max_errors }
    }

    /// Set the number of workers
    pub fn with_workers(mut self, workers: i64) -> Self {
        self.workers = workers;
        self
    }

    /// Set the failure threshold
    pub fn with_max_errors(mut self, max_errors: i64) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.workers <= 0 {
            return Err(ExecutorError::InvalidConfiguration(format!(
                "worker count must be positive, got {}",
                self.workers
            )));
        }
        Ok(())
    }

    /// Worker count as a pool size, saturating where `usize` is narrower
    /// than `i64`. Only meaningful after [`validate`](Self::validate).
    pub fn worker_count(&self) -> usize {
        usize::try_from(self.workers.max(0)).unwrap_or(usize::MAX)
    }

    /// Failure threshold, `None` when unlimited
    pub fn threshold(&self) -> Option<usize> {
        if self.max_errors > 0 {
            Some(self.max_errors as usize)
        } else {
            None
        }
    }
}

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Configuration validated, pool not started
    Idle,
    /// Workers active, dispatcher feeding tasks
    Dispatching,
    /// Threshold crossed; in-flight tasks finishing, nothing new starts
    Draining,
    /// Every task dispatched and finished
    Completed,
    /// All workers joined
    Terminated,
}

/// Final verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Batch finished without reaching the failure threshold
    Success,
    /// Failure threshold reached, remaining tasks abandoned
    ErrorsLimitExceeded,
    /// Threshold not reached, but some tasks never started
    Incomplete,
}

/// Aggregate counters of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Tasks submitted
    pub total: usize,
    /// Tasks that began executing
    pub started: usize,
    /// Tasks that returned `Ok`
    pub succeeded: usize,
    /// Tasks that returned `Err` or panicked
    pub failed: usize,
    /// Subset of `failed` that panicked
    pub panicked: usize,
    /// Tasks never started because the run was aborted
    pub skipped: usize,
    /// Failure threshold in effect, `None` when unlimited
    pub limit: Option<usize>,
    /// Wall time of the run
    pub elapsed: Duration,
    /// Final verdict
    pub outcome: RunOutcome,
}

impl RunReport {
    pub(crate) fn empty(limit: Option<usize>) -> Self {
        Self {
            total: 0,
            started: 0,
            succeeded: 0,
            failed: 0,
            panicked: 0,
            skipped: 0,
            limit,
            elapsed: Duration::ZERO,
            outcome: RunOutcome::Success,
        }
    }

    /// Whether the run finished without hitting the threshold
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// Collapse the report into the call result
    pub fn into_result(self) -> Result<()> {
        match self.outcome {
            RunOutcome::Success => Ok(()),
            RunOutcome::ErrorsLimitExceeded => Err(ExecutorError::ErrorsLimitExceeded {
                limit: self.limit.unwrap_or_default(),
                failures: self.failed,
            }),
            RunOutcome::Incomplete => Err(ExecutorError::Incomplete {
                started: self.started,
                total: self.total,
            }),
        }
    }
}
