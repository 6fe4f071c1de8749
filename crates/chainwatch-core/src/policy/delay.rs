//! Backoff delay strategies — pure functions of the attempt index.

use std::time::Duration;

/// Produces the wait between a failed attempt and the next one.
///
/// `attempt` is 0-based: `next(0)` is the delay after the first failure.
/// Implementations must be deterministic and side-effect free.
pub trait DelayStrategy: Send + Sync {
    fn next(&self, attempt: u32) -> Duration;
}

/// The same delay after every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl DelayStrategy for FixedDelay {
    fn next(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Exponentially growing delay, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDelay {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl ExponentialDelay {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }
}

impl Default for ExponentialDelay {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl DelayStrategy for ExponentialDelay {
    fn next(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_ms = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let cap_ms = self.max.as_millis() as f64;
        Duration::from_millis(base_ms.min(cap_ms) as u64)
    }
}
