//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Router lookup:
//!     → response_cache.rs (visibility + freshness selection)
//!     → store.rs (newest-first entries for entity/provider/check)
//!
//! Router win:
//!     → response_cache.rs (windows from FreshnessPolicy, tenant rules)
//!     → store.rs (append)
//! ```
//!
//! # Design Decisions
//! - Freshness is computed at read time, never stored
//! - Paid results are shared across tenants; customer data is not
//! - Invalidation clamps windows instead of deleting

pub mod response_cache;
pub mod store;
pub mod types;

pub use response_cache::{CacheLookup, ResponseCache};
pub use store::{CacheStore, MemoryCacheStore};
pub use types::{CacheEntry, DataOrigin, Freshness, FreshnessPolicy, FreshnessWindow};
