//! Parallel run example
//!
//! Builds a batch of tasks where a random share fails, runs it on a bounded
//! pool and prints the aggregate report.
//!
//! Configuration comes from the environment:
//! `TASKPOOL_WORKERS`, `TASKPOOL_MAX_ERRORS`, `TASKPOOL_TASKS`, `TASKPOOL_FAIL_RATE`.

use anyhow::Context;
use rand::Rng;
use std::time::Duration;
use taskpool::pool::{task, ExecutorConfig, ParallelExecutor, Task, TaskError};
use tracing_subscriber::EnvFilter;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn make_tasks(count: usize, fail_rate: f64) -> Vec<Task> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let fails = rng.gen_bool(fail_rate);
            let work = Duration::from_millis(rng.gen_range(5..50));
            task(move || {
                std::thread::sleep(work);
                if fails {
                    Err(TaskError::failed(format!("task {} failed", i + 1)))
                } else {
                    Ok(())
                }
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskpool=info")),
        )
        .init();

    let config = ExecutorConfig::new(
        env_or("TASKPOOL_WORKERS", 4)?,
        env_or("TASKPOOL_MAX_ERRORS", 3)?,
    );
    let task_count: usize = env_or("TASKPOOL_TASKS", 20)?;
    let fail_rate: f64 = env_or("TASKPOOL_FAIL_RATE", 0.2)?;
    anyhow::ensure!((0.0..=1.0).contains(&fail_rate), "TASKPOOL_FAIL_RATE must be within 0..=1");

    println!(
        "Running {} tasks on {} workers, max errors {}",
        task_count, config.workers, config.max_errors
    );

    let executor = ParallelExecutor::new(config)?.with_progress_callback(|finished, total| {
        tracing::debug!(finished, total, "progress");
    });
    let report = executor.execute_with_report(make_tasks(task_count, fail_rate)).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.into_result() {
        Ok(()) => println!("Batch completed"),
        Err(e) => println!("Batch aborted: {}", e),
    }
    Ok(())
}
