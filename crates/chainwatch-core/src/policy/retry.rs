//! Timeout-bounded retry loop for a single endpoint call.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WatchError;
use crate::policy::delay::{DelayStrategy, ExponentialDelay};

/// Per-call retry settings, shared by height discovery and block fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per endpoint call, including the first.
    pub max_attempts: u32,
    /// Time budget of a single attempt (milliseconds).
    pub attempt_timeout_ms: u64,
    /// Backoff after the first failed attempt (milliseconds).
    pub initial_delay_ms: u64,
    /// Cap on any single backoff (milliseconds).
    pub max_delay_ms: u64,
    /// Backoff growth factor.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout_ms: 10_000,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// The backoff strategy described by this config.
    pub fn delay_strategy(&self) -> ExponentialDelay {
        ExponentialDelay::new(
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
        )
    }
}

/// Run `job` until it succeeds, racing every attempt against `attempt_timeout`.
///
/// A timed-out attempt is dropped (its future is cancelled, never awaited
/// again) and counts as a failure. After failed attempt `i` (0-based) the
/// runner sleeps `strategy.next(i)`; there is no sleep after the last attempt.
/// Only errors with [`WatchError::is_retryable`] are retried; any other error
/// (a malformed payload, `Disposed`, an executor error) is returned at once
/// without spending the remaining attempts or sleeping.
pub async fn execute_with_timeout<T, F, Fut>(
    strategy: &dyn DelayStrategy,
    mut job: F,
    max_attempts: u32,
    attempt_timeout: Duration,
) -> Result<T, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WatchError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        let err = match tokio::time::timeout(attempt_timeout, job()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => WatchError::Timeout {
                ms: attempt_timeout.as_millis() as u64,
            },
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            tracing::debug!(attempts = max_attempts, error = %err, "retries exhausted");
            return Err(err);
        }

        let delay = strategy.next(attempt);
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::delay::FixedDelay;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<u64, WatchError>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                std::future::ready(Err(WatchError::Transport("connection refused".into())))
            } else {
                std::future::ready(Ok(42))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures_and_sleeps_sum_of_delays() {
        let strategy = ExponentialDelay::new(Duration::from_millis(100), Duration::from_secs(10), 2.0);
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let value = execute_with_timeout(&strategy, flaky(3, calls.clone()), 5, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // next(0) + next(1) + next(2) = 100 + 200 + 400
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_skips_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let value = execute_with_timeout(
            &FixedDelay(Duration::from_secs(5)),
            flaky(0, calls.clone()),
            3,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let err = execute_with_timeout(
            &FixedDelay(Duration::from_millis(50)),
            flaky(10, calls.clone()),
            3,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WatchError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let job = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, WatchError>(n)
            }
        };
        let start = Instant::now();
        let value = execute_with_timeout(
            &FixedDelay(Duration::from_millis(10)),
            job,
            2,
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        assert_eq!(value, 1);
        assert_eq!(start.elapsed(), Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_on_last_attempt_is_reported() {
        let job = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u64, WatchError>(0)
        };
        let err = execute_with_timeout(&FixedDelay(Duration::ZERO), job, 1, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Timeout { ms: 300 }));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let job = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u64, _>(WatchError::Disposed) }
        };
        let err = execute_with_timeout(&FixedDelay(Duration::from_secs(1)), job, 5, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_builds_matching_strategy() {
        let cfg = RetryConfig::default();
        let strategy = cfg.delay_strategy();
        assert_eq!(strategy.next(0), Duration::from_millis(500));
        assert_eq!(strategy.next(5), Duration::from_secs(5));
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(10));
    }
}
