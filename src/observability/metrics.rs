//! Metrics collection.
//!
//! # Metrics
//! - `gateway_routes_total` (counter): routed requests by outcome
//! - `gateway_route_duration_seconds` (histogram): end-to-end routing latency
//! - `gateway_provider_attempts_total` (counter): provider calls by outcome
//! - `gateway_cache_lookups_total` (counter): cache lookups by result
//! - `gateway_circuit_transitions_total` (counter): breaker state changes
//! - `gateway_rate_limited_total` (counter): token bucket denials
//! - `gateway_provider_health` (gauge): 1=routable, 0=not routable
//! - `gateway_cost_amount` (histogram): cost per recorded charge
//!
//! Recording goes through the `metrics` facade; installing an exporter is up
//! to the embedding process.

use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::health::state::HealthStatus;
use crate::resilience::circuit_breaker::CircuitState;

/// Record the outcome of one routed request.
pub fn record_route(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("gateway_routes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_route_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record a single provider call.
pub fn record_provider_attempt(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_provider_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a cache lookup (`fresh`, `stale` or `miss`).
pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_circuit_transition(provider: &str, to: CircuitState) {
    metrics::counter!(
        "gateway_circuit_transitions_total",
        "provider" => provider.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_rate_limited(provider: &str) {
    metrics::counter!(
        "gateway_rate_limited_total",
        "provider" => provider.to_string()
    )
    .increment(1);
}

pub fn record_provider_health(provider: &str, status: HealthStatus) {
    let value = if status.is_routable() { 1.0 } else { 0.0 };
    metrics::gauge!("gateway_provider_health", "provider" => provider.to_string()).set(value);
}

pub fn record_cost(provider: &str, amount: Decimal, cache_hit: bool) {
    let hit = if cache_hit { "true" } else { "false" };
    metrics::histogram!(
        "gateway_cost_amount",
        "provider" => provider.to_string(),
        "cache_hit" => hit
    )
    .record(amount.to_f64().unwrap_or_default());
}

pub fn record_budget_warning(tenant: &str, exceeded: bool) {
    let level = if exceeded { "exceeded" } else { "warning" };
    metrics::counter!(
        "gateway_budget_alerts_total",
        "tenant" => tenant.to_string(),
        "level" => level
    )
    .increment(1);
}
