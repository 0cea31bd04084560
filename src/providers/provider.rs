//! Call contract every data provider implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::providers::types::{CheckResult, CheckType, HealthCheckResult, ProviderInfo};

/// An external source of verification data.
///
/// Implementations own their transport and payload parsing. The gateway only
/// looks at the fields of [`CheckResult`]; `normalized_data` is passed through.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static metadata, fixed at registration.
    fn info(&self) -> &ProviderInfo;

    /// Shortcut for `info().id`.
    fn id(&self) -> &str {
        &self.info().id
    }

    /// Run one check for `subject` in `locale`.
    ///
    /// Transport failures must be reported as an unsuccessful result with
    /// `retryable` set appropriately, not as a panic.
    async fn execute_check(
        &self,
        check_type: CheckType,
        subject: &Value,
        locale: &str,
    ) -> CheckResult;

    /// Probe the provider's own health endpoint.
    async fn health_check(&self) -> HealthCheckResult;
}
