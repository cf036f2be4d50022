//! Bounded retry policy for transient provider failures.
//!
//! Replaces ad hoc in-line retry loops with a policy object that can be
//! tested independently of network I/O.

use std::time::Duration;

/// Exponential-backoff retry policy: `base_delay * multiplier^(attempt-1)`,
/// capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after a failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.cap)
    }

    /// Whether another attempt should be made after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
