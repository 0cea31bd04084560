//! Cost accounting types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::types::CheckType;

/// One billable (or cache-served) provider call. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: Uuid,
    /// Screening the call belongs to, if any.
    pub query_id: Option<String>,
    pub provider_id: String,
    pub check_type: CheckType,
    pub tenant_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub cache_hit: bool,
    pub timestamp: DateTime<Utc>,
}

impl CostRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        provider_id: impl Into<String>,
        check_type: CheckType,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_id: None,
            provider_id: provider_id.into(),
            check_type,
            tenant_id: tenant_id.into(),
            amount,
            currency: currency.into(),
            cache_hit: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.cache_hit = cache_hit;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Spend avoided by serving from cache. Reporting only, never budgeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSavings {
    pub id: Uuid,
    pub tenant_id: String,
    pub provider_id: String,
    pub check_type: CheckType,
    pub amount_saved: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Spending limits of a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub tenant_id: String,
    #[serde(default)]
    pub daily_limit: Option<Decimal>,
    #[serde(default)]
    pub monthly_limit: Option<Decimal>,
    /// Fraction of a limit at which a warning is raised.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: Decimal,
    /// Refuse work over the limit instead of only warning.
    #[serde(default)]
    pub hard_limit: bool,
}

fn default_warning_threshold() -> Decimal {
    dec!(0.8)
}

impl BudgetConfig {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            daily_limit: None,
            monthly_limit: None,
            warning_threshold: default_warning_threshold(),
            hard_limit: false,
        }
    }

    pub fn with_daily_limit(mut self, limit: Decimal) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn with_monthly_limit(mut self, limit: Decimal) -> Self {
        self.monthly_limit = Some(limit);
        self
    }

    pub fn with_warning_threshold(mut self, threshold: Decimal) -> Self {
        self.warning_threshold = threshold;
        self
    }

    pub fn hard(mut self) -> Self {
        self.hard_limit = true;
        self
    }
}

/// Where a tenant stands against its budget, including a pending estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub tenant_id: String,
    pub estimated_cost: Decimal,
    pub daily_used: Decimal,
    pub monthly_used: Decimal,
    pub daily_limit: Option<Decimal>,
    pub monthly_limit: Option<Decimal>,
    /// `None` when the window is unlimited.
    pub daily_remaining: Option<Decimal>,
    pub monthly_remaining: Option<Decimal>,
    pub daily_warning: bool,
    pub daily_exceeded: bool,
    pub monthly_warning: bool,
    pub monthly_exceeded: bool,
    pub hard_limit: bool,
}

impl BudgetStatus {
    /// Status for a tenant with no budget configured.
    pub fn unlimited(tenant_id: impl Into<String>, estimated_cost: Decimal) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            estimated_cost,
            daily_used: Decimal::ZERO,
            monthly_used: Decimal::ZERO,
            daily_limit: None,
            monthly_limit: None,
            daily_remaining: None,
            monthly_remaining: None,
            daily_warning: false,
            daily_exceeded: false,
            monthly_warning: false,
            monthly_exceeded: false,
            hard_limit: false,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.daily_exceeded || self.monthly_exceeded
    }

    pub fn is_warning(&self) -> bool {
        self.daily_warning || self.monthly_warning
    }

    /// Whether the pending work must be refused.
    pub fn blocks(&self) -> bool {
        self.hard_limit && self.is_exceeded()
    }
}

/// Aggregated spend over a time range.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost: Decimal,
    pub total_saved: Decimal,
    pub records: usize,
    pub cache_hits: usize,
    pub by_provider: BTreeMap<String, Decimal>,
    pub by_check_type: BTreeMap<CheckType, Decimal>,
}
