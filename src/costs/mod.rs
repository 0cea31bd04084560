//! Cost accounting and tenant budgets.
//!
//! # Data Flow
//! ```text
//! Router:
//!     → ledger.rs check_budget (advisory, before provider calls)
//!     → provider win: ledger.rs record_cost → store.rs
//!     → fresh cache hit: ledger.rs record_cache_savings → store.rs
//! ```
//!
//! # Design Decisions
//! - Amounts are `Decimal`, never floats
//! - Savings are reported separately and never count against a budget
//! - Budget windows are the current UTC day and UTC month

pub mod ledger;
pub mod pricing;
pub mod store;
pub mod types;

pub use ledger::CostLedger;
pub use pricing::CostEstimates;
pub use store::{CostStore, MemoryCostStore};
pub use types::{BudgetConfig, BudgetStatus, CacheSavings, CostRecord, CostSummary};
