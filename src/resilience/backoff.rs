//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Backoff delay before retry number `attempt + 1`, without jitter.
///
/// `base * 2^attempt`, capped at `max`. Attempt 0 is the delay after the
/// first failure.
pub fn exponential_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(max)
}

/// Calculate exponential backoff delay with ±10% jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = exponential_delay(attempt, base, max);
    if delay.is_zero() {
        return delay;
    }
    let jitter: f64 = rand::thread_rng().gen_range(0.9..=1.1);
    delay.mul_f64(jitter)
}
