//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cache::types::FreshnessPolicy;
use crate::costs::types::BudgetConfig;
use crate::providers::types::ProviderInfo;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Retry, timeout and fallback behavior of the router.
    pub router: RouterConfig,

    /// Per-provider circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-provider token bucket settings.
    pub rate_limit: RateLimitConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Cost estimates and currency.
    pub costs: CostConfig,

    /// Tenant budgets.
    pub budgets: Vec<BudgetConfig>,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static provider metadata (used by the CLI for dry-run ranking).
    pub providers: Vec<ProviderInfo>,
}

/// Router behavior.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Attempts per provider before falling back (at least 1).
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_retry_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_retry_delay_ms: u64,

    /// Deadline for a single provider call in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Serve STALE cache entries instead of calling a provider.
    pub accept_stale: bool,

    /// Wait for a token instead of skipping a rate-limited provider.
    pub wait_for_rate_limit: bool,

    /// Tokens debited per provider call.
    pub tokens_per_request: f64,

    /// Maximum in-flight sub-requests for parallel batches.
    pub batch_concurrency: usize,
}

impl RouterConfig {
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
            attempt_timeout_ms: 30_000,
            accept_stale: false,
            wait_for_rate_limit: false,
            tokens_per_request: 1.0,
            batch_concurrency: 4,
        }
    }
}

/// Settings of a single circuit breaker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Half-open successes needed to close the circuit.
    pub success_threshold: u32,

    /// Seconds after the last failure before trial calls are allowed.
    pub timeout_secs: u64,

    /// Maximum concurrent trial calls while half-open.
    pub half_open_max_calls: u32,
}

impl CircuitBreakerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_secs: 60,
            half_open_max_calls: 1,
        }
    }
}

/// Circuit breaker configuration with per-provider overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub defaults: CircuitBreakerSettings,
    pub providers: HashMap<String, CircuitBreakerSettings>,
}

impl CircuitBreakerConfig {
    pub fn settings_for(&self, provider_id: &str) -> CircuitBreakerSettings {
        self.providers
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }
}

/// Settings of a single token bucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Bucket capacity (burst size).
    pub max_tokens: f64,

    /// Continuous refill rate.
    pub tokens_per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_tokens: 10.0,
            tokens_per_second: 5.0,
        }
    }
}

/// Rate limiting configuration with per-provider overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RateLimitConfig {
    pub defaults: RateLimitSettings,
    pub providers: HashMap<String, RateLimitSettings>,
}

impl RateLimitConfig {
    pub fn settings_for(&self, provider_id: &str) -> RateLimitSettings {
        self.providers
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON snapshot file for the in-memory store, loaded at startup and
    /// written at shutdown.
    pub persistence_path: Option<String>,

    /// Freshness windows per check category.
    pub freshness: FreshnessPolicy,
}

/// Cost accounting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CostConfig {
    /// ISO currency code for every recorded amount.
    pub currency: String,

    /// Estimate used for check types without an explicit entry.
    pub default_estimate: Decimal,

    /// Estimated cost per check type, keyed by wire name (`CRIMINAL_NATIONAL`).
    pub estimates: BTreeMap<String, Decimal>,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            default_estimate: dec!(10),
            estimates: BTreeMap::new(),
        }
    }
}

/// Active health check configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failed visits before routed traffic marks a provider
    /// degraded.
    pub degraded_threshold: u32,

    /// 24h success rate below which a provider is marked degraded.
    pub degraded_success_rate: f64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            degraded_threshold: 5,
            degraded_success_rate: 0.9,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.router, RouterConfig::default());
        assert_eq!(config.costs.currency, "USD");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_per_provider_overrides() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [circuit_breaker.defaults]
            failure_threshold = 4

            [circuit_breaker.providers.acme]
            failure_threshold = 2
            timeout_secs = 5

            [rate_limit.providers.acme]
            max_tokens = 3.0
            tokens_per_second = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.settings_for("other").failure_threshold, 4);
        let acme = config.circuit_breaker.settings_for("acme");
        assert_eq!(acme.failure_threshold, 2);
        assert_eq!(acme.success_threshold, 2);
        assert_eq!(config.rate_limit.settings_for("acme").max_tokens, 3.0);
        assert_eq!(config.rate_limit.settings_for("other"), RateLimitSettings::default());
    }
}
