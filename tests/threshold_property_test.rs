//! Property tests for threshold cancellation
//!
//! For any failure pattern, worker count and limit, the verdict and the set
//! of tasks that ran must agree with the failure count of the batch.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskpool::pool::{execute, task, Task, TaskError};
use taskpool::ExecutorError;

fn counting_tasks(fails: &[bool], counters: &Arc<Vec<AtomicUsize>>) -> Vec<Task> {
    fails
        .iter()
        .enumerate()
        .map(|(i, &fail)| {
            let counters = counters.clone();
            task(move || {
                counters[i].fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(TaskError::failed("planned failure"))
                } else {
                    Ok(())
                }
            })
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn verdict_matches_failure_count(
        fails in prop::collection::vec(any::<bool>(), 0..40),
        workers in 1i64..8,
        max_errors in -2i64..8,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let counters: Arc<Vec<AtomicUsize>> =
            Arc::new(fails.iter().map(|_| AtomicUsize::new(0)).collect());
        let tasks = counting_tasks(&fails, &counters);
        let result = runtime.block_on(execute(tasks, workers, max_errors));

        let failing = fails.iter().filter(|&&f| f).count();
        let runs: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
        prop_assert!(runs.iter().all(|&n| n <= 1), "a task ran twice: {:?}", runs);

        let started = runs.iter().sum::<usize>();
        if max_errors > 0 && failing >= max_errors as usize {
            let limit_hit = matches!(result, Err(ExecutorError::ErrorsLimitExceeded { .. }));
            prop_assert!(limit_hit, "expected errors limit exceeded, got {:?}", result);
            prop_assert!(started >= max_errors as usize);
            prop_assert!(started <= fails.len());
        } else {
            prop_assert!(result.is_ok(), "unexpected error: {:?}", result);
            prop_assert_eq!(started, fails.len());
        }
    }

    #[test]
    fn invalid_workers_never_run(workers in -50i64..=0, max_errors in -5i64..5) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let tasks = vec![task(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })];

        let result = taskpool::run(tasks, workers, max_errors);

        let rejected = matches!(result, Err(ExecutorError::InvalidConfiguration(_)));
        prop_assert!(rejected);
        prop_assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
