//! Passive health tracking from routed call outcomes.
//!
//! # Responsibilities
//! - Observe provider call outcomes reported by the router
//! - Track consecutive failures and a trailing 24h success rate
//! - Publish the derived `ProviderHealth` to the registry
//!
//! # Design Decisions
//! - Timeouts count as failures
//! - Circuit and rate-limit skips are not observations
//! - Maintenance is operator-owned; passive results never clear it
//! - Passive outcomes never go below Degraded; only an active probe marks a
//!   provider Unhealthy; live failures are excluded by the circuit breaker
//! - The success rate only degrades a provider once enough samples exist

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthStatus, ProviderHealth};
use crate::providers::registry::ProviderRegistry;
use crate::providers::types::HealthCheckResult;

const WINDOW_HOURS: i64 = 24;
const MIN_SAMPLES_FOR_RATE: usize = 10;

#[derive(Debug, Default)]
struct OutcomeWindow {
    outcomes: VecDeque<(DateTime<Utc>, bool)>,
    consecutive_failures: u32,
}

impl OutcomeWindow {
    fn push(&mut self, at: DateTime<Utc>, success: bool) {
        self.outcomes.push_back((at, success));
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.evict(at);
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - ChronoDuration::hours(WINDOW_HOURS);
        while self.outcomes.front().is_some_and(|(ts, _)| *ts < cutoff) {
            self.outcomes.pop_front();
        }
    }

    fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let ok = self.outcomes.iter().filter(|(_, s)| *s).count();
        ok as f64 / self.outcomes.len() as f64
    }
}

/// Turns call outcomes into registry health entries.
#[derive(Debug)]
pub struct HealthTracker {
    registry: Arc<ProviderRegistry>,
    config: HealthCheckConfig,
    windows: DashMap<String, OutcomeWindow>,
}

impl HealthTracker {
    pub fn new(registry: Arc<ProviderRegistry>, config: HealthCheckConfig) -> Self {
        Self {
            registry,
            config,
            windows: DashMap::new(),
        }
    }

    pub fn record_success(&self, provider_id: &str) -> ProviderHealth {
        self.record_at(provider_id, true, Utc::now())
    }

    pub fn record_failure(&self, provider_id: &str) -> ProviderHealth {
        self.record_at(provider_id, false, Utc::now())
    }

    /// Record one provider visit outcome and publish the resulting health.
    pub fn record_at(
        &self,
        provider_id: &str,
        success: bool,
        now: DateTime<Utc>,
    ) -> ProviderHealth {
        let (consecutive_failures, success_rate, samples) = {
            let mut window = self.windows.entry(provider_id.to_string()).or_default();
            window.push(now, success);
            (
                window.consecutive_failures,
                window.success_rate(),
                window.outcomes.len(),
            )
        };

        let status = if self.is_in_maintenance(provider_id) {
            HealthStatus::Maintenance
        } else if consecutive_failures >= self.config.degraded_threshold
            || (samples >= MIN_SAMPLES_FOR_RATE && success_rate < self.config.degraded_success_rate)
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        self.publish(provider_id, status, consecutive_failures, success_rate, now)
    }

    /// Apply an active probe result. `None` means the probe timed out.
    pub fn record_probe(
        &self,
        provider_id: &str,
        result: Option<HealthCheckResult>,
    ) -> ProviderHealth {
        let now = Utc::now();
        let (consecutive_failures, success_rate) = {
            let mut window = self.windows.entry(provider_id.to_string()).or_default();
            window.evict(now);
            match &result {
                Some(r) if r.status.is_routable() => window.consecutive_failures = 0,
                Some(r) if r.status == HealthStatus::Maintenance => {}
                _ => {
                    window.consecutive_failures = window.consecutive_failures.saturating_add(1)
                }
            }
            let rate = result
                .as_ref()
                .map(|r| r.success_rate)
                .unwrap_or_else(|| window.success_rate());
            (window.consecutive_failures, rate)
        };

        let status = match result {
            Some(r) => r.status,
            None => HealthStatus::Unhealthy,
        };
        self.publish(provider_id, status, consecutive_failures, success_rate, now)
    }

    /// Drop all observations for a provider.
    pub fn forget(&self, provider_id: &str) {
        self.windows.remove(provider_id);
    }

    fn is_in_maintenance(&self, provider_id: &str) -> bool {
        self.registry
            .provider_health(provider_id)
            .is_some_and(|h| h.status == HealthStatus::Maintenance)
    }

    fn publish(
        &self,
        provider_id: &str,
        status: HealthStatus,
        consecutive_failures: u32,
        success_rate_24h: f64,
        now: DateTime<Utc>,
    ) -> ProviderHealth {
        let health = ProviderHealth {
            provider_id: provider_id.to_string(),
            status,
            last_check: now,
            consecutive_failures,
            success_rate_24h,
        };
        self.registry.update_provider_health(health.clone());
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HealthTracker {
        let config = HealthCheckConfig {
            degraded_threshold: 3,
            ..HealthCheckConfig::default()
        };
        HealthTracker::new(Arc::new(ProviderRegistry::new()), config)
    }

    #[test]
    fn test_failure_streak_degrades_but_stays_routable() {
        let tracker = tracker();
        assert_eq!(tracker.record_failure("a").status, HealthStatus::Healthy);
        assert_eq!(tracker.record_failure("a").status, HealthStatus::Healthy);
        let health = tracker.record_failure("a");
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.consecutive_failures, 3);

        for _ in 0..20 {
            assert!(tracker.record_failure("a").status.is_routable());
        }

        let health = tracker.record_success("a");
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_low_success_rate_degrades() {
        let tracker = tracker();
        let now = Utc::now();
        for i in 0..10 {
            tracker.record_at("a", i % 2 == 0, now);
        }
        let health = tracker.registry.provider_health("a").unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!((health.success_rate_24h - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_old_outcomes_leave_window() {
        let tracker = tracker();
        let start = Utc::now();
        for _ in 0..2 {
            tracker.record_at("a", false, start);
        }
        let later = start + ChronoDuration::hours(25);
        let health = tracker.record_at("a", true, later);
        assert_eq!(health.success_rate_24h, 1.0);
    }

    #[test]
    fn test_maintenance_is_sticky() {
        let tracker = tracker();
        tracker
            .registry
            .update_provider_health(
                ProviderHealth::healthy("a").with_status(HealthStatus::Maintenance),
            );
        assert_eq!(tracker.record_success("a").status, HealthStatus::Maintenance);
    }

    #[test]
    fn test_probe_timeout_marks_unhealthy() {
        let tracker = tracker();
        let health = tracker.record_probe("a", None);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.consecutive_failures, 1);

        let health = tracker.record_probe(
            "a",
            Some(HealthCheckResult {
                status: HealthStatus::Healthy,
                latency_ms: 12,
                success_rate: 0.99,
            }),
        );
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.consecutive_failures, 0);
    }
}
