//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call:
//!     → circuit_breaker.rs (permit or skip)
//!     → timeouts.rs (deadline per attempt)
//!     → On failure: retries.rs (retryable? then backoff.rs delay)
//!     → circuit_breaker.rs (one outcome recorded per request)
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerStats, CircuitPermit, CircuitState,
};
pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, TimedOut};
