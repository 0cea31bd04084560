//! Verification Gateway Library
//!
//! Resilience layer between callers that need verification data (criminal
//! records, credit reports, identity checks) and the interchangeable external
//! providers that supply it.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!   RoutedRequest │                  VERIFICATION GATEWAY                 │
//!   ──────────────┼─▶ routing ──▶ cache (fresh / stale / miss)            │
//!                 │      │                                                │
//!                 │      ▼                                                │
//!                 │   providers::registry (ranked, healthy candidates)    │
//!                 │      │                                                │
//!                 │      ▼  per candidate                                 │
//!                 │   resilience::circuit_breaker ─▶ rate_limit ─▶ call   │
//!                 │      │        (timeouts, retries with backoff)        │
//!                 │      ▼                                                │
//!   RoutedResult  │   cache store + costs::ledger                         │
//!   ◀─────────────┼──                                                     │
//!                 │   health (active + passive)   config   lifecycle      │
//!                 └──────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod costs;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod providers;
pub mod rate_limit;
pub mod resilience;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use lifecycle::{Gateway, Shutdown};
pub use providers::{Provider, ProviderRegistry};
pub use routing::{RequestRouter, RoutedRequest, RoutedResult};
