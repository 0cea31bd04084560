//! Outbound rate limiting.
//!
//! # Data Flow
//! ```text
//! Router, before each provider:
//!     → registry.rs (bucket for provider, created full on first use)
//!     → bucket.rs (lazy refill, then debit or deny with retry_after)
//! ```
//!
//! # Design Decisions
//! - One bucket per provider, never shared
//! - Refill computed from elapsed time on access, no timer task
//! - Denial is a status value; `acquire_or_raise` is the opt-in error path
//! - Debited tokens are not refunded when the call fails or times out

pub mod bucket;
pub mod registry;

pub use bucket::{RateLimitResult, TokenBucket};
pub use registry::RateLimiterRegistry;
