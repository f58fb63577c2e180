//! Batch scheduling for fetches.
//!
//! Work items are split into consecutive fixed-size batches. Every item in a
//! batch runs concurrently and the whole batch settles before the next one
//! starts. Results keep submission order, not completion order.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::throttle::Retryable;

/// Progress report for one settled batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Zero-based batch index.
    pub index: usize,
    pub total_batches: usize,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of a scheduling run.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Successes in submission order.
    pub results: Vec<T>,
    pub batches_run: usize,
    pub failures: usize,
    /// Cancellation or the result cap ended the run before all batches ran.
    pub stopped_early: bool,
}

/// Fixed-width batch runner with inter-batch delays.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl BatchScheduler {
    /// `batch_size` is clamped to at least 1.
    pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            inter_batch_delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches `len` items split into.
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// Run `work` over `items` batch by batch.
    ///
    /// Failures are logged and dropped. Cancellation and `max_results` are
    /// checked before each batch; once `max_results` successes exist no
    /// further batch starts and the excess is discarded. After a batch with
    /// rate-limit failures the pause grows to the longest retry hint.
    pub async fn run_batches<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        max_results: Option<usize>,
        work: F,
        mut on_batch: impl FnMut(&BatchReport),
    ) -> BatchOutcome<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let total_batches = self.batch_count(items.len());
        let mut outcome = BatchOutcome {
            results: Vec::new(),
            batches_run: 0,
            failures: 0,
            stopped_early: false,
        };

        let mut pending = items.into_iter().peekable();
        let mut index = 0;

        while pending.peek().is_some() {
            if cancel.is_cancelled() {
                debug!(batch = index, "Cancelled before batch");
                outcome.stopped_early = true;
                break;
            }
            if max_results.is_some_and(|cap| outcome.results.len() >= cap) {
                debug!(batch = index, "Result cap reached before batch");
                outcome.stopped_early = true;
                break;
            }

            let batch: Vec<I> = pending.by_ref().take(self.batch_size).collect();
            let submitted = batch.len();
            let settled = join_all(batch.into_iter().map(&work)).await;

            let mut succeeded = 0;
            let mut backoff = self.inter_batch_delay;
            for result in settled {
                match result {
                    Ok(value) => {
                        succeeded += 1;
                        outcome.results.push(value);
                    }
                    Err(e) => {
                        outcome.failures += 1;
                        if let Some(hint) = e.retry_after() {
                            backoff = backoff.max(hint);
                        }
                        warn!(batch = index, error = %e, "Dropping failed item");
                    }
                }
            }
            if let Some(cap) = max_results {
                outcome.results.truncate(cap);
            }

            outcome.batches_run += 1;
            let report = BatchReport {
                index,
                total_batches,
                submitted,
                succeeded,
                failed: submitted - succeeded,
            };
            debug!(
                batch = index,
                total_batches,
                succeeded,
                failed = report.failed,
                "Batch settled"
            );
            on_batch(&report);
            index += 1;

            if pending.peek().is_some() && !backoff.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum WorkError {
        #[error("odd item {0}")]
        Odd(u32),
        #[error("rate limited")]
        Limited,
    }

    impl Retryable for WorkError {
        fn is_retryable(&self) -> bool {
            matches!(self, WorkError::Limited)
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                WorkError::Limited => Some(Duration::from_millis(60)),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_seven_items_run_in_three_batches() {
        let scheduler = BatchScheduler::new(3, Duration::ZERO);
        let mut reports = Vec::new();

        let outcome = scheduler
            .run_batches(
                (1..=7u32).collect(),
                &CancellationToken::new(),
                None,
                |n| async move {
                    if n % 2 == 0 {
                        Err(WorkError::Odd(n))
                    } else {
                        Ok(n)
                    }
                },
                |r| reports.push(r.clone()),
            )
            .await;

        assert_eq!(outcome.batches_run, 3);
        let sizes: Vec<_> = reports.iter().map(|r| r.submitted).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(outcome.results, vec![1, 3, 5, 7]);
        assert_eq!(outcome.failures, 3);
        assert!(outcome.results.len() <= 7);
        assert!(!outcome.stopped_early);
    }

    #[tokio::test]
    async fn test_results_keep_submission_order() {
        let scheduler = BatchScheduler::new(4, Duration::ZERO);
        let outcome = scheduler
            .run_batches(
                vec![40u64, 10, 30, 0],
                &CancellationToken::new(),
                None,
                |ms| async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, WorkError>(ms)
                },
                |_| {},
            )
            .await;
        assert_eq!(outcome.results, vec![40, 10, 30, 0]);
    }

    #[tokio::test]
    async fn test_batches_do_not_overlap() {
        let scheduler = BatchScheduler::new(2, Duration::ZERO);
        let log = Mutex::new(Vec::new());

        scheduler
            .run_batches(
                vec![0u32, 1, 2, 3],
                &CancellationToken::new(),
                None,
                |n| {
                    let log = &log;
                    async move {
                        log.lock().unwrap().push(format!("start {n}"));
                        tokio::time::sleep(Duration::from_millis(10 * (2 - n as u64 % 2))).await;
                        log.lock().unwrap().push(format!("end {n}"));
                        Ok::<_, WorkError>(n)
                    }
                },
                |_| {},
            )
            .await;

        let log = log.into_inner().unwrap();
        let last_end_first_batch = log.iter().rposition(|e| e == "end 0" || e == "end 1");
        let first_start_second_batch = log.iter().position(|e| e == "start 2" || e == "start 3");
        assert!(last_end_first_batch.unwrap() < first_start_second_batch.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_batch() {
        let scheduler = BatchScheduler::new(2, Duration::ZERO);
        let cancel = CancellationToken::new();

        let outcome = scheduler
            .run_batches(
                vec![1u32, 2, 3, 4, 5],
                &cancel,
                None,
                |n| async move { Ok::<_, WorkError>(n) },
                |_| cancel.cancel(),
            )
            .await;

        assert_eq!(outcome.batches_run, 1);
        assert_eq!(outcome.results, vec![1, 2]);
        assert!(outcome.stopped_early);
    }

    #[tokio::test]
    async fn test_result_cap_truncates_and_stops() {
        let scheduler = BatchScheduler::new(3, Duration::ZERO);
        let outcome = scheduler
            .run_batches(
                (1..=9u32).collect(),
                &CancellationToken::new(),
                Some(4),
                |n| async move { Ok::<_, WorkError>(n) },
                |_| {},
            )
            .await;

        assert_eq!(outcome.batches_run, 2);
        assert_eq!(outcome.results, vec![1, 2, 3, 4]);
        assert!(outcome.stopped_early);
    }

    #[tokio::test]
    async fn test_delay_only_between_batches() {
        let scheduler = BatchScheduler::new(5, Duration::from_secs(10));
        let started = Instant::now();
        scheduler
            .run_batches(
                vec![1u32, 2, 3],
                &CancellationToken::new(),
                None,
                |n| async move { Ok::<_, WorkError>(n) },
                |_| {},
            )
            .await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_limit_hint_extends_pause() {
        let scheduler = BatchScheduler::new(1, Duration::from_millis(1));
        let started = Instant::now();
        let outcome = scheduler
            .run_batches(
                vec![0u32, 1],
                &CancellationToken::new(),
                None,
                |n| async move {
                    if n == 0 {
                        Err(WorkError::Limited)
                    } else {
                        Ok(n)
                    }
                },
                |_| {},
            )
            .await;
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(outcome.results, vec![1]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let scheduler = BatchScheduler::new(0, Duration::ZERO);
        assert_eq!(scheduler.batch_size(), 1);
        assert_eq!(scheduler.batch_count(3), 3);
        assert_eq!(scheduler.batch_count(0), 0);
    }
}
