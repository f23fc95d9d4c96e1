//! Per-run shared state
//!
//! One [`RunState`] is created for every executor call and shared by `Arc`
//! between the dispatcher and the workers. It is dropped when the call returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Failure counter, cancellation signal and aggregate counters of one run
#[derive(Debug)]
pub struct RunState {
    threshold: Option<usize>,
    failures: AtomicUsize,
    started: AtomicUsize,
    succeeded: AtomicUsize,
    panicked: AtomicUsize,
    cancel: CancellationToken,
}

impl RunState {
    /// Fresh state; `threshold` of `None` never cancels
    pub fn new(threshold: Option<usize>) -> Self {
        Self {
            threshold,
            failures: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by the dispatcher and workers
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Failure threshold, `None` when unlimited
    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }

    /// Count a task that began executing
    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a task that returned `Ok`
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a panic; the failure itself goes through [`record_failure`](Self::record_failure)
    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one failure and cancel the run if this pushes the count to the
    /// threshold. Returns `true` for the single call that crossed it.
    ///
    /// Increment and comparison are one `fetch_add`, so every caller sees a
    /// distinct post-increment value and exactly one of them equals the
    /// threshold.
    pub fn record_failure(&self) -> bool {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        match self.threshold {
            Some(limit) if failures >= limit => {
                let crossed = failures == limit;
                if crossed {
                    warn!(failures, limit, "Failure threshold reached, cancelling run");
                }
                // idempotent
                self.cancel.cancel();
                crossed
            }
            _ => false,
        }
    }

    /// Failures so far
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Tasks started so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Tasks succeeded so far
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Tasks that panicked so far
    pub fn panicked(&self) -> usize {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Finished tasks, successful or not
    pub fn finished(&self) -> usize {
        self.succeeded() + self.failures()
    }

    /// Whether the failure count reached the threshold
    pub fn limit_exceeded(&self) -> bool {
        matches!(self.threshold, Some(limit) if self.failures() >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unlimited_never_cancels() {
        let state = RunState::new(None);
        for _ in 0..100 {
            assert!(!state.record_failure());
        }
        assert_eq!(state.failures(), 100);
        assert!(!state.is_cancelled());
        assert!(!state.limit_exceeded());
    }

    #[test]
    fn test_threshold_cancels_once() {
        let state = RunState::new(Some(2));
        assert!(!state.record_failure());
        assert!(!state.is_cancelled());
        assert!(state.record_failure());
        assert!(state.is_cancelled());
        // past the threshold: still cancelled, not re-crossed
        assert!(!state.record_failure());
        assert!(state.is_cancelled());
        assert_eq!(state.failures(), 3);
    }

    #[test]
    fn test_concurrent_failures_cross_exactly_once() {
        let state = Arc::new(RunState::new(Some(50)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    (0..25).filter(|_| state.record_failure()).count()
                })
            })
            .collect();

        let crossings: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(crossings, 1);
        assert_eq!(state.failures(), 200);
        assert!(state.is_cancelled());
    }

    #[test]
    fn test_finished_counts_both_outcomes() {
        let state = RunState::new(None);
        state.record_start();
        state.record_success();
        state.record_start();
        state.record_failure();
        state.record_panic();
        assert_eq!(state.started(), 2);
        assert_eq!(state.finished(), 2);
        assert_eq!(state.panicked(), 1);
    }
}
