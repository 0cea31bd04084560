//! Cache entry and freshness types.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::types::{CheckCategory, CheckType, NormalizedData};

/// Where a cached result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataOrigin {
    /// Supplied by a tenant; visible to that tenant only.
    CustomerProvided,
    /// Bought from a provider; shared across tenants.
    PaidExternal,
}

/// Freshness of an entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Expired => "expired",
        }
    }
}

/// Fresh period and the additional stale period after it, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessWindow {
    pub fresh_days: u32,
    pub stale_days: u32,
}

impl FreshnessWindow {
    pub const fn new(fresh_days: u32, stale_days: u32) -> Self {
        Self {
            fresh_days,
            stale_days,
        }
    }

    /// `(fresh_until, stale_until)` for an entry acquired at `acquired_at`.
    pub fn bounds(&self, acquired_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let fresh_until = acquired_at + ChronoDuration::days(i64::from(self.fresh_days));
        let stale_until = fresh_until + ChronoDuration::days(i64::from(self.stale_days));
        (fresh_until, stale_until)
    }
}

/// Freshness windows per check category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    pub criminal: FreshnessWindow,
    pub credit: FreshnessWindow,
    pub employment: FreshnessWindow,
    pub education: FreshnessWindow,
    pub identity: FreshnessWindow,
    pub default: FreshnessWindow,
}

impl FreshnessPolicy {
    pub fn window_for(&self, category: CheckCategory) -> FreshnessWindow {
        match category {
            CheckCategory::Criminal => self.criminal,
            CheckCategory::Credit => self.credit,
            CheckCategory::Employment => self.employment,
            CheckCategory::Education => self.education,
            CheckCategory::Identity => self.identity,
            CheckCategory::Other => self.default,
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            criminal: FreshnessWindow::new(7, 14),
            credit: FreshnessWindow::new(30, 30),
            employment: FreshnessWindow::new(90, 90),
            education: FreshnessWindow::new(365, 365),
            identity: FreshnessWindow::new(30, 60),
            default: FreshnessWindow::new(7, 7),
        }
    }
}

/// A stored provider result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: Uuid,
    pub entity_id: String,
    pub provider_id: String,
    pub check_type: CheckType,
    pub acquired_at: DateTime<Utc>,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
    pub data_origin: DataOrigin,
    /// Owning tenant for customer-provided data; `None` for shared entries.
    pub tenant_id: Option<String>,
    pub payload: NormalizedData,
}

impl CacheEntry {
    pub fn freshness_at(&self, now: DateTime<Utc>) -> Freshness {
        if now < self.fresh_until {
            Freshness::Fresh
        } else if now < self.stale_until {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Utc::now())
    }

    /// Whether `tenant_id` may read this entry.
    pub fn is_visible_to(&self, tenant_id: Option<&str>) -> bool {
        match self.data_origin {
            DataOrigin::PaidExternal => true,
            DataOrigin::CustomerProvided => {
                self.tenant_id.is_some() && self.tenant_id.as_deref() == tenant_id
            }
        }
    }
}
