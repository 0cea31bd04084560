//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Whatever metrics exporter the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured fields (provider, tenant, check_type) on every event
//! - Metrics are cheap (atomic increments behind the facade)

pub mod logging;
pub mod metrics;
