//! Request, result and failure types of the router.

use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::cache::types::Freshness;
use crate::costs::types::BudgetStatus;
use crate::providers::types::{CheckType, NormalizedData, ServiceTier};

/// One verification data request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedRequest {
    pub check_type: CheckType,
    /// Opaque subject description handed to the provider.
    pub subject: Value,
    pub locale: String,
    /// Cache key of the person or organisation being checked.
    pub entity_id: String,
    pub tenant_id: String,
    pub tier: ServiceTier,
    /// Screening this check belongs to, carried into cost records.
    pub screening_id: Option<String>,
}

impl RoutedRequest {
    pub fn new(
        check_type: CheckType,
        subject: Value,
        locale: impl Into<String>,
        entity_id: impl Into<String>,
        tenant_id: impl Into<String>,
        tier: ServiceTier,
    ) -> Self {
        Self {
            check_type,
            subject,
            locale: locale.into(),
            entity_id: entity_id.into(),
            tenant_id: tenant_id.into(),
            tier,
            screening_id: None,
        }
    }

    pub fn with_screening_id(mut self, screening_id: impl Into<String>) -> Self {
        self.screening_id = Some(screening_id.into());
        self
    }
}

/// Why routing produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// No healthy provider supports the check, locale and tier.
    NoProvider,
    /// Every candidate was skipped by its circuit breaker.
    AllCircuitsOpen,
    /// Every candidate was skipped by its rate limiter.
    AllRateLimited,
    /// Anything else: attempts failed, or skips were mixed.
    AllProvidersFailed,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::NoProvider => "NO_PROVIDER",
            FailureReason::AllCircuitsOpen => "ALL_CIRCUITS_OPEN",
            FailureReason::AllRateLimited => "ALL_RATE_LIMITED",
            FailureReason::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single skip or failed attempt against one provider.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptError {
    #[error("circuit open")]
    CircuitOpen,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("provider error {code}: {message}")]
    Provider {
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },
}

impl AttemptError {
    /// Whether the provider was actually called.
    pub fn is_attempt(&self) -> bool {
        matches!(self, AttemptError::Provider { .. } | AttemptError::Timeout { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub error: AttemptError,
}

/// Aggregate failure after every candidate was exhausted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteFailure {
    pub reason: FailureReason,
    pub message: String,
    /// Every skip and failed attempt, in the order they happened.
    pub provider_errors: Vec<ProviderFailure>,
}

/// Outcome of routing one request. Exhaustion is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedResult {
    pub success: bool,
    pub provider_id: Option<String>,
    pub check_type: CheckType,
    pub data: Option<NormalizedData>,
    /// Provider calls made (cache hits make none).
    pub attempts: u32,
    pub elapsed: Duration,
    pub cache_hit: bool,
    pub freshness: Option<Freshness>,
    pub cost_incurred: Decimal,
    pub cost_saved: Decimal,
    /// Advisory budget status checked before provider calls.
    pub budget: Option<BudgetStatus>,
    pub failure: Option<RouteFailure>,
}

impl RoutedResult {
    pub(crate) fn failed(check_type: CheckType, failure: RouteFailure) -> Self {
        Self {
            success: false,
            provider_id: None,
            check_type,
            data: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            cache_hit: false,
            freshness: None,
            cost_incurred: Decimal::ZERO,
            cost_saved: Decimal::ZERO,
            budget: None,
            failure: Some(failure),
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure.as_ref().map(|f| f.reason)
    }
}
