//! Token bucket rate limiter.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::RateLimitSettings;
use crate::observability::metrics;

/// Outcome of an admission check. Denial is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// How long until enough tokens are available. Zero when allowed.
    pub retry_after: Duration,
    /// Tokens left after this check.
    pub remaining: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A per-provider token bucket.
///
/// Refill happens lazily on every access; there is no background task.
/// Tokens are debited before the provider call and never refunded.
#[derive(Debug)]
pub struct TokenBucket {
    provider_id: String,
    max_tokens: f64,
    tokens_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(provider_id: impl Into<String>, settings: &RateLimitSettings) -> Self {
        Self {
            provider_id: provider_id.into(),
            max_tokens: settings.max_tokens,
            tokens_per_second: settings.tokens_per_second,
            state: Mutex::new(BucketState {
                tokens: settings.max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    pub fn tokens_per_second(&self) -> f64 {
        self.tokens_per_second
    }

    /// Take `n` tokens, optionally waiting once for the refill.
    ///
    /// With `wait = false` an insufficient bucket denies immediately without
    /// consuming anything. With `wait = true` the caller sleeps for the
    /// computed `retry_after` and checks once more.
    pub async fn acquire(&self, n: f64, wait: bool) -> RateLimitResult {
        let first = self.try_acquire(n);
        if first.allowed || !wait {
            return first;
        }

        tracing::debug!(
            provider = %self.provider_id,
            wait_ms = first.retry_after.as_millis() as u64,
            "Waiting for rate limit tokens"
        );
        tokio::time::sleep(first.retry_after).await;
        self.try_acquire(n)
    }

    /// Take `n` tokens if available, without waiting.
    pub fn try_acquire(&self, n: f64) -> RateLimitResult {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());

        if state.tokens >= n {
            state.tokens -= n;
            return RateLimitResult {
                allowed: true,
                retry_after: Duration::ZERO,
                remaining: state.tokens,
            };
        }

        metrics::record_rate_limited(&self.provider_id);
        RateLimitResult {
            allowed: false,
            retry_after: self.time_to(n - state.tokens),
            remaining: state.tokens,
        }
    }

    /// Would `n` tokens be granted right now? Consumes nothing.
    pub fn check(&self, n: f64) -> RateLimitResult {
        let state = self.lock();
        let tokens = self.projected(&state, Instant::now());
        if tokens >= n {
            RateLimitResult {
                allowed: true,
                retry_after: Duration::ZERO,
                remaining: tokens,
            }
        } else {
            RateLimitResult {
                allowed: false,
                retry_after: self.time_to(n - tokens),
                remaining: tokens,
            }
        }
    }

    /// Tokens available right now.
    pub fn available_tokens(&self) -> f64 {
        let state = self.lock();
        self.projected(&state, Instant::now())
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().expect("token bucket mutex poisoned")
    }

    fn projected(&self, state: &BucketState, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        (state.tokens + elapsed * self.tokens_per_second).min(self.max_tokens)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        state.tokens = self.projected(state, now);
        state.last_refill = now;
    }

    fn time_to(&self, deficit: f64) -> Duration {
        if self.tokens_per_second <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(deficit / self.tokens_per_second).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(max: f64, rate: f64) -> TokenBucket {
        TokenBucket::new(
            "p",
            &RateLimitSettings {
                max_tokens: max,
                tokens_per_second: rate,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_full_and_drains() {
        let b = bucket(3.0, 1.0);
        assert!(b.try_acquire(1.0).allowed);
        assert!(b.try_acquire(1.0).allowed);
        assert!(b.try_acquire(1.0).allowed);

        let denied = b.try_acquire(1.0);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_after_idle() {
        let b = bucket(5.0, 2.0);
        assert!(b.try_acquire(5.0).allowed);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(b.available_tokens(), 5.0);
        assert_eq!(b.check(1.0).remaining, 5.0);
        assert!(!b.try_acquire(6.0).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_does_not_consume_partial_tokens() {
        let b = bucket(4.0, 1.0);
        assert!(b.try_acquire(3.0).allowed);

        let denied = b.try_acquire(2.0);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 1.0);
        assert_eq!(b.available_tokens(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_is_side_effect_free() {
        let b = bucket(2.0, 1.0);
        for _ in 0..10 {
            assert!(b.check(2.0).allowed);
        }
        assert_eq!(b.available_tokens(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_refill() {
        let b = bucket(10.0, 4.0);
        assert!(b.try_acquire(10.0).allowed);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(b.available_tokens(), 2.0);
        assert!(b.try_acquire(2.0).allowed);
        assert!(!b.try_acquire(1.0).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_once() {
        let b = bucket(1.0, 2.0);
        assert!(b.acquire(1.0, false).await.allowed);
        assert!(!b.acquire(1.0, false).await.allowed);

        let start = Instant::now();
        let waited = b.acquire(1.0, true).await;
        assert!(waited.allowed);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }
}
