//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each provider
//!     → passive.rs publishes to the registry
//!
//! Passive health checks (passive.rs):
//!     Router reports a call outcome
//!     → Update failure streak and 24h success rate
//!     → Registry health entry overwritten
//!
//! Routing reads the registry entry (state.rs):
//!     Healthy / Degraded → eligible
//!     Unhealthy / Maintenance → excluded
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Health state is per-provider; no entry means healthy

pub mod active;
pub mod passive;
pub mod state;

pub use active::HealthMonitor;
pub use passive::HealthTracker;
pub use state::{HealthStatus, ProviderHealth};
