//! Parallel Executor Implementation
//!
//! Runs a fixed batch of tasks on a bounded pool of workers:
//! - A single dispatcher feeds tasks one at a time through a bounded channel
//! - `min(workers, tasks)` long-lived worker tasks pull and run them
//! - Failures are counted atomically; reaching the threshold cancels the run
//! - Every worker is joined before the call returns; dropping the call
//!   cancels the run and aborts the workers

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

use crate::metrics::{self, Timer};
use crate::pool::state::RunState;
use crate::pool::types::*;
use crate::Result;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Task>>>;

/// Worker handles that are aborted if the run is dropped before joining them
struct WorkerHandles(Vec<JoinHandle<()>>);

impl WorkerHandles {
    async fn join(&mut self) {
        for joined in futures::future::join_all(self.0.iter_mut()).await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed to join");
            }
        }
    }
}

impl Drop for WorkerHandles {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Keeps the active worker gauge balanced, including when a worker is aborted
struct ActiveWorker;

impl ActiveWorker {
    fn enter() -> Self {
        metrics::worker_started();
        ActiveWorker
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        metrics::worker_stopped();
    }
}

/// Executor for running a batch of tasks on a bounded worker pool
pub struct ParallelExecutor {
    config: ExecutorConfig,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ParallelExecutor {
    /// Create an executor, rejecting an invalid configuration up front
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress_callback: None,
        })
    }

    /// Set progress callback, called with `(finished, total)` after each task
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Configuration this executor was built with
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the batch and return only the aggregate verdict
    pub async fn execute(&self, tasks: Vec<Task>) -> Result<()> {
        self.execute_with_report(tasks).await.into_result()
    }

    /// Run the batch and return aggregate counters
    #[instrument(
        skip(self, tasks),
        fields(
            run_id = %Uuid::new_v4(),
            task_count = tasks.len(),
            workers = self.config.workers,
            max_errors = self.config.max_errors,
        )
    )]
    pub async fn execute_with_report(&self, tasks: Vec<Task>) -> RunReport {
        let timer = Timer::start();
        let total = tasks.len();
        let threshold = self.config.threshold();
        debug!(phase = ?RunPhase::Idle, "Configuration validated");

        if tasks.is_empty() {
            info!("No tasks to execute");
            let report = RunReport::empty(threshold);
            metrics::record_run(&report);
            return report;
        }

        // more workers than tasks would only idle
        let worker_count = self.config.worker_count().min(total);
        info!(
            total_tasks = total,
            worker_count,
            limit = ?threshold,
            "Starting parallel execution"
        );

        let state = Arc::new(RunState::new(threshold));
        // dropping this future mid-run cancels the run
        let cancel_on_drop = state.cancel_token().clone().drop_guard();
        let (tx, rx) = mpsc::channel::<Task>(worker_count);
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        debug!(phase = ?RunPhase::Dispatching, "Spawning workers");
        let mut workers = WorkerHandles((0..worker_count)
            .map(|worker_id| {
                let worker = worker_loop(
                    worker_id,
                    rx.clone(),
                    state.clone(),
                    self.progress_callback.clone(),
                    total,
                );
                tokio::spawn(worker.instrument(Span::current()))
            })
            .collect());
        drop(rx);

        let dispatched = dispatch(tasks, tx, &state).await;
        if state.is_cancelled() {
            debug!(phase = ?RunPhase::Draining, dispatched, "Dispatch stopped, draining workers");
        } else {
            debug!(phase = ?RunPhase::Completed, dispatched, "All tasks dispatched");
        }

        workers.join().await;
        cancel_on_drop.disarm();
        debug!(phase = ?RunPhase::Terminated, "All workers joined");

        let started = state.started();
        let report = RunReport {
            total,
            started,
            succeeded: state.succeeded(),
            failed: state.failures(),
            panicked: state.panicked(),
            skipped: total - started,
            limit: threshold,
            elapsed: timer.elapsed(),
            outcome: run_outcome(state.limit_exceeded(), started, total),
        };

        info!(
            total_tasks = report.total,
            started = report.started,
            succeeded = report.succeeded,
            failed = report.failed,
            panicked = report.panicked,
            skipped = report.skipped,
            duration_ms = report.elapsed.as_millis(),
            outcome = ?report.outcome,
            "Parallel execution completed"
        );
        metrics::record_run(&report);

        report
    }
}

/// Success requires every task to have started; the threshold takes precedence
fn run_outcome(limit_exceeded: bool, started: usize, total: usize) -> RunOutcome {
    if limit_exceeded {
        RunOutcome::ErrorsLimitExceeded
    } else if started < total {
        RunOutcome::Incomplete
    } else {
        RunOutcome::Success
    }
}

/// Feed tasks to the workers until the batch is exhausted or the run is
/// cancelled. Returns the number of tasks handed over.
///
/// The sender is dropped on return, which closes the channel for the workers.
async fn dispatch(tasks: Vec<Task>, tx: mpsc::Sender<Task>, state: &RunState) -> usize {
    let mut dispatched = 0;

    for task in tasks {
        if state.is_cancelled() {
            break;
        }
        tokio::select! {
            biased;
            _ = state.cancel_token().cancelled() => break,
            sent = tx.send(task) => {
                if sent.is_err() {
                    warn!(dispatched, "Workers exited before dispatch finished");
                    break;
                }
                dispatched += 1;
            }
        }
    }

    dispatched
}

async fn worker_loop(
    worker_id: usize,
    rx: SharedReceiver,
    state: Arc<RunState>,
    progress: Option<Arc<ProgressCallback>>,
    total: usize,
) {
    let _active = ActiveWorker::enter();
    debug!(worker_id, "Worker started");

    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = state.cancel_token().cancelled() => None,
                task = rx.recv() => task,
            }
        };

        let task = match next {
            Some(task) => task,
            None => break,
        };

        // buffered before cancellation, must not start
        if state.is_cancelled() {
            debug!(worker_id, "Discarding task received after cancellation");
            break;
        }

        run_task(worker_id, task, &state).await;

        if let Some(ref callback) = progress {
            let finished = state.finished();
            if catch_unwind(AssertUnwindSafe(|| callback(finished, total))).is_err() {
                warn!(worker_id, finished, total, "Progress callback panicked");
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}

/// Run one task on the blocking pool and account its outcome.
/// A panic inside the task counts as a failure.
async fn run_task(worker_id: usize, task: Task, state: &RunState) {
    state.record_start();

    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(())) => {
            state.record_success();
            debug!(worker_id, "Task completed successfully");
        }
        Ok(Err(e)) => {
            debug!(worker_id, error = %e, "Task failed");
            state.record_failure();
        }
        Err(e) if e.is_panic() => {
            error!(worker_id, "Task panicked");
            state.record_panic();
            state.record_failure();
        }
        Err(e) => {
            error!(worker_id, error = %e, "Task aborted before completion");
            state.record_failure();
        }
    }
}

/// Run `tasks` on `workers` concurrent workers, aborting once `max_errors`
/// tasks have failed. `max_errors <= 0` tolerates any number of failures.
pub async fn execute(tasks: Vec<Task>, workers: i64, max_errors: i64) -> Result<()> {
    ParallelExecutor::new(ExecutorConfig::new(workers, max_errors))?
        .execute(tasks)
        .await
}

/// Blocking form of [`execute`]. Builds its own multi-threaded runtime, so it
/// must not be called from inside an async context.
pub fn run(tasks: Vec<Task>, workers: i64, max_errors: i64) -> Result<()> {
    let config = ExecutorConfig::new(workers, max_errors);
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("taskpool-worker")
        .build()?;
    runtime.block_on(async {
        ParallelExecutor::new(config)?.execute(tasks).await
    })
}
