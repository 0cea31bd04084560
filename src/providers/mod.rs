//! Provider subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Provider implementations → registry.rs (register, id must be unique)
//!
//! Per request:
//!     (check_type, locale, tier)
//!     → registry.rs filters by tier, capability, locale, cached health
//!     → ranked list: cheapest, then most reliable
//! ```
//!
//! # Design Decisions
//! - Capabilities are immutable once registered
//! - The gateway never inspects provider payloads

pub mod provider;
pub mod registry;
pub mod types;

pub use provider::Provider;
pub use registry::ProviderRegistry;
pub use types::{
    CheckCategory, CheckResult, CheckType, CostTier, HealthCheckResult, NormalizedData,
    ProviderCapability, ProviderCategory, ProviderInfo, ServiceTier,
};
