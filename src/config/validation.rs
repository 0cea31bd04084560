//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, rates, fractions)
//! - Check references (cost estimate keys name real check types)
//! - Detect duplicates (tenants, provider ids)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use rust_decimal::Decimal;

use crate::config::schema::{CircuitBreakerSettings, GatewayConfig, RateLimitSettings};
use crate::providers::types::CheckType;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem, located by its dotted config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_router(config, &mut errors);

    check_breaker("circuit_breaker.defaults", &config.circuit_breaker.defaults, &mut errors);
    let mut ids: Vec<_> = config.circuit_breaker.providers.keys().collect();
    ids.sort();
    for id in ids {
        check_breaker(
            &format!("circuit_breaker.providers.{id}"),
            &config.circuit_breaker.providers[id],
            &mut errors,
        );
    }

    let tokens = config.router.tokens_per_request;
    check_bucket("rate_limit.defaults", &config.rate_limit.defaults, tokens, &mut errors);
    let mut ids: Vec<_> = config.rate_limit.providers.keys().collect();
    ids.sort();
    for id in ids {
        check_bucket(
            &format!("rate_limit.providers.{id}"),
            &config.rate_limit.providers[id],
            tokens,
            &mut errors,
        );
    }

    validate_costs(config, &mut errors);
    validate_budgets(config, &mut errors);
    validate_health(config, &mut errors);
    validate_providers(config, &mut errors);

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_router(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let router = &config.router;
    if router.max_retries == 0 {
        errors.push(ValidationError::new("router.max_retries", "must be at least 1"));
    }
    if router.base_retry_delay_ms > router.max_retry_delay_ms {
        errors.push(ValidationError::new(
            "router.base_retry_delay_ms",
            "must not exceed max_retry_delay_ms",
        ));
    }
    if router.attempt_timeout_ms == 0 {
        errors.push(ValidationError::new("router.attempt_timeout_ms", "must be greater than 0"));
    }
    if !(router.tokens_per_request > 0.0) {
        errors.push(ValidationError::new("router.tokens_per_request", "must be greater than 0"));
    }
    if router.batch_concurrency == 0 {
        errors.push(ValidationError::new("router.batch_concurrency", "must be at least 1"));
    }
}

fn check_breaker(path: &str, settings: &CircuitBreakerSettings, errors: &mut Vec<ValidationError>) {
    if settings.failure_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{path}.failure_threshold"),
            "must be at least 1",
        ));
    }
    if settings.success_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{path}.success_threshold"),
            "must be at least 1",
        ));
    }
    if settings.half_open_max_calls == 0 {
        errors.push(ValidationError::new(
            format!("{path}.half_open_max_calls"),
            "must be at least 1",
        ));
    }
}

fn check_bucket(
    path: &str,
    settings: &RateLimitSettings,
    tokens_per_request: f64,
    errors: &mut Vec<ValidationError>,
) {
    if !(settings.max_tokens > 0.0) {
        errors.push(ValidationError::new(format!("{path}.max_tokens"), "must be greater than 0"));
    } else if settings.max_tokens < tokens_per_request {
        errors.push(ValidationError::new(
            format!("{path}.max_tokens"),
            "is smaller than router.tokens_per_request; no call could ever be admitted",
        ));
    }
    if !(settings.tokens_per_second > 0.0) {
        errors.push(ValidationError::new(
            format!("{path}.tokens_per_second"),
            "must be greater than 0",
        ));
    }
}

fn validate_costs(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let costs = &config.costs;
    let currency_ok =
        costs.currency.len() == 3 && costs.currency.chars().all(|c| c.is_ascii_uppercase());
    if !currency_ok {
        errors.push(ValidationError::new(
            "costs.currency",
            format!("'{}' is not a three-letter ISO code", costs.currency),
        ));
    }
    if costs.default_estimate < Decimal::ZERO {
        errors.push(ValidationError::new("costs.default_estimate", "must not be negative"));
    }
    for (name, amount) in &costs.estimates {
        if name.parse::<CheckType>().is_err() {
            errors.push(ValidationError::new(
                format!("costs.estimates.{name}"),
                "unknown check type",
            ));
        } else if *amount < Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("costs.estimates.{name}"),
                "must not be negative",
            ));
        }
    }
}

fn validate_budgets(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for (i, budget) in config.budgets.iter().enumerate() {
        let path = format!("budgets[{i}]");
        if budget.tenant_id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{path}.tenant_id"), "must not be empty"));
        } else if !seen.insert(budget.tenant_id.as_str()) {
            errors.push(ValidationError::new(
                format!("{path}.tenant_id"),
                format!("duplicate tenant '{}'", budget.tenant_id),
            ));
        }
        for (field, limit) in [
            ("daily_limit", budget.daily_limit),
            ("monthly_limit", budget.monthly_limit),
        ] {
            if limit.is_some_and(|l| l <= Decimal::ZERO) {
                errors.push(ValidationError::new(
                    format!("{path}.{field}"),
                    "must be greater than 0",
                ));
            }
        }
        if budget.warning_threshold <= Decimal::ZERO || budget.warning_threshold > Decimal::ONE {
            errors.push(ValidationError::new(
                format!("{path}.warning_threshold"),
                "must be in (0, 1]",
            ));
        }
    }
}

fn validate_health(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let health = &config.health_check;
    if health.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
    }
    if health.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than 0"));
    }
    if health.degraded_threshold == 0 {
        errors.push(ValidationError::new("health_check.degraded_threshold", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&health.degraded_success_rate) {
        errors.push(ValidationError::new(
            "health_check.degraded_success_rate",
            "must be in [0, 1]",
        ));
    }
}

fn validate_providers(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let path = format!("providers[{i}]");
        if provider.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{path}.id"), "must not be empty"));
        } else if !seen.insert(provider.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{path}.id"),
                format!("duplicate provider '{}'", provider.id),
            ));
        }
        for (j, capability) in provider.capabilities.iter().enumerate() {
            if !(0.0..=1.0).contains(&capability.reliability_score) {
                errors.push(ValidationError::new(
                    format!("{path}.capabilities[{j}].reliability_score"),
                    "must be in [0, 1]",
                ));
            }
        }
    }
}
