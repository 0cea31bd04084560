//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RoutedRequest
//!     → cache (FRESH hit, or STALE when accepted) → RoutedResult
//!     → registry (ranked healthy candidates)
//!     → per candidate: circuit permit → token → attempts with deadline
//!         → retryable failure: backoff, same provider
//!         → non-retryable / exhausted: next provider
//!     → win: cache store + cost record → RoutedResult
//!     → exhaustion: RoutedResult carrying a RouteFailure
//! ```
//!
//! # Design Decisions
//! - Expected failures are values, never `Err`
//! - Every skip and failed attempt is kept for the caller
//! - Deterministic: same health and config always try providers in the same order

pub mod router;
pub mod types;

pub use router::{RequestRouter, RequestRouterBuilder};
pub use types::{
    AttemptError, FailureReason, ProviderFailure, RouteFailure, RoutedRequest, RoutedResult,
};
