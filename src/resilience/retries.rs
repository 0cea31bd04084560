//! Retry policy for provider calls.
//!
//! # Responsibilities
//! - Bound attempts per provider
//! - Decide whether a failed attempt may be retried
//! - Produce the jittered delay before the next attempt
//!
//! # Design Decisions
//! - A provider's own `retryable` flag is authoritative
//! - Timeouts are retryable
//! - Circuit and rate-limit skips are never retried on the same provider

use std::time::Duration;

use crate::config::RouterConfig;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            config.max_retries,
            config.base_retry_delay(),
            config.max_retry_delay(),
        )
    }

    /// Attempts allowed per provider (never zero).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow the zero-based `attempt` that
    /// just failed.
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt + 1 < self.max_attempts
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(0, true));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(0, true));
        assert!(policy.should_retry(1, true));
        assert!(!policy.should_retry(2, true));
        assert!(!policy.should_retry(0, false));
    }
}
