//! Provider health state.
//!
//! # States
//! - Healthy: provider receives traffic
//! - Degraded: provider receives traffic, success rate below target
//! - Unhealthy: provider excluded from routing
//! - Maintenance: provider excluded from routing by operator or probe
//!
//! # Design Decisions
//! - One entry per provider, overwritten as a whole (last write wins)
//! - A provider with no entry is treated as healthy (cold start)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Maintenance,
}

impl HealthStatus {
    /// Whether routing may send traffic to a provider in this state.
    pub fn is_routable(self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Cached health of a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
    /// Success rate over the trailing 24 hours, `0.0..=1.0`.
    pub success_rate_24h: f64,
}

impl ProviderHealth {
    /// A fresh healthy entry.
    pub fn healthy(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: HealthStatus::Healthy,
            last_check: Utc::now(),
            consecutive_failures: 0,
            success_rate_24h: 1.0,
        }
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routable_states() {
        assert!(HealthStatus::Healthy.is_routable());
        assert!(HealthStatus::Degraded.is_routable());
        assert!(!HealthStatus::Unhealthy.is_routable());
        assert!(!HealthStatus::Maintenance.is_routable());
    }
}
