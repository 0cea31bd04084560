//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Register providers → Restore cache snapshot
//!     → Build router → Spawn health monitor (+ config applier)
//!
//! Shutdown (shutdown.rs):
//!     trigger() → background tasks exit → cache snapshot written
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Shutdown has a deadline for background tasks

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};
