//! # Exponential Backoff
//!
//! Capped exponential backoff with equal jitter for retrying transient failures.
//!
//! The ceiling for attempt `n` is `min(max, base * 2^n)`. The returned delay is
//! drawn uniformly from `[ceiling / 2, ceiling]`, so retries of many resources
//! failing together spread out while every delay still grows with the attempt
//! count.
//!
//! ## Usage
//!
//! ```rust
//! use deployment_manager_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60));
//! let first = backoff.next_backoff();
//! assert!(first >= Duration::from_millis(500) && first <= Duration::from_secs(1));
//! ```

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `base` and never exceeding `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Number of delays handed out so far
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Upper bound of the next delay, without jitter
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);

        let half = ceiling / 2;
        let spread = ceiling - half;
        if spread.is_zero() {
            return ceiling;
        }
        let jitter = rand::thread_rng().gen_range(0..=spread.as_millis());
        half + Duration::from_millis(u64::try_from(jitter).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_doubles_until_capped() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut ceilings = Vec::new();
        for _ in 0..6 {
            ceilings.push(backoff.ceiling().as_secs());
            backoff.next_backoff();
        }
        assert_eq!(ceilings, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_delay_stays_within_jitter_window() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(60));
        for _ in 0..20 {
            let ceiling = backoff.ceiling();
            let delay = backoff.next_backoff();
            assert!(delay <= ceiling, "{delay:?} above {ceiling:?}");
            assert!(delay >= ceiling / 2, "{delay:?} below half of {ceiling:?}");
        }
    }

    #[test]
    fn test_large_attempt_counts_saturate() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(300));
        for _ in 0..100 {
            backoff.next_backoff();
        }
        assert_eq!(backoff.ceiling(), Duration::from_secs(300));
    }
}
