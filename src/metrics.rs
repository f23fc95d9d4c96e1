//! Metrics collection for executor runs
//!
//! Prometheus-compatible counters for runs, task outcomes and worker activity.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

use crate::pool::{RunOutcome, RunReport};

lazy_static! {
    /// Counter for finished runs by outcome
    static ref RUNS: IntCounterVec = register_int_counter_vec!(
        "taskpool_runs_total",
        "Total number of executor runs",
        &["outcome"]
    ).unwrap();

    /// Counter for tasks by final status
    static ref TASKS: IntCounterVec = register_int_counter_vec!(
        "taskpool_tasks_total",
        "Total number of tasks by status",
        &["status"]
    ).unwrap();

    /// Histogram for run duration
    static ref RUN_DURATION: Histogram = register_histogram!(
        "taskpool_run_duration_seconds",
        "Executor run duration in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    /// Gauge for workers currently alive
    static ref ACTIVE_WORKERS: IntGauge = register_int_gauge!(
        "taskpool_active_workers",
        "Number of currently running pool workers"
    ).unwrap();
}

/// Record a worker starting
pub fn worker_started() {
    ACTIVE_WORKERS.inc();
}

/// Record a worker exiting
pub fn worker_stopped() {
    ACTIVE_WORKERS.dec();
}

/// Record the counters of a finished run
pub fn record_run(report: &RunReport) {
    let outcome = match report.outcome {
        RunOutcome::Success => "success",
        RunOutcome::ErrorsLimitExceeded => "errors_limit_exceeded",
        RunOutcome::Incomplete => "incomplete",
    };
    RUNS.with_label_values(&[outcome]).inc();
    RUN_DURATION.observe(report.elapsed.as_secs_f64());

    let tasks = [
        ("succeeded", report.succeeded),
        ("failed", report.failed - report.panicked),
        ("panicked", report.panicked),
        ("skipped", report.skipped),
    ];
    for (status, count) in tasks {
        TASKS.with_label_values(&[status]).inc_by(count as u64);
    }
}

/// Timer for measuring run duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since the timer started
    #[inline]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

/// Export metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer)
        .map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e).into())
}
