//! Gateway error types.

use std::time::Duration;

use thiserror::Error;

use crate::costs::types::BudgetStatus;
use crate::providers::types::{CheckType, ServiceTier};

/// Errors surfaced by gateway components.
///
/// Expected outcomes (an open circuit, a denied token, a soft budget warning)
/// are reported through status values; these variants are for callers that
/// explicitly ask for hard failure semantics, or for conditions the gateway
/// cannot recover from.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A provider with the same id is already registered.
    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    /// No registered provider can serve the check.
    #[error("no provider available for {check_type} in locale {locale} ({tier})")]
    NoProviderAvailable {
        check_type: CheckType,
        locale: String,
        tier: ServiceTier,
    },

    /// A provider's token bucket denied the request.
    #[error("provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Duration,
    },

    /// A tenant with a hard limit would exceed its budget.
    #[error("budget exceeded for tenant {tenant_id}")]
    BudgetExceeded {
        tenant_id: String,
        status: Box<BudgetStatus>,
    },

    /// The caller passed arguments the gateway refuses to act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
