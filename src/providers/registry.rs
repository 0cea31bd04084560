//! Provider registry.
//!
//! # Responsibilities
//! - Hold registered providers in registration order
//! - Cache the latest health entry per provider
//! - Answer "which providers, best first, can serve this check"
//!
//! # Design Decisions
//! - Ranking is cheapest first, then most reliable first
//! - Ties keep registration order (stable sort)
//! - Missing health entry = healthy

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::error::{GatewayError, GatewayResult};
use crate::health::state::{HealthStatus, ProviderHealth};
use crate::observability::metrics;
use crate::providers::provider::Provider;
use crate::providers::types::{CheckType, CostTier, ProviderInfo, ServiceTier};

/// Sort key of a provider able to serve a given check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRank {
    pub cost_tier: CostTier,
    /// `1 - reliability_score`, so lower is better.
    pub unreliability: f64,
}

impl CandidateRank {
    fn compare(&self, other: &Self) -> Ordering {
        self.cost_tier
            .cmp(&other.cost_tier)
            .then_with(|| self.unreliability.total_cmp(&other.unreliability))
    }
}

/// Rank a provider for a check, or `None` if it cannot serve it.
///
/// Health is not considered here; see [`ProviderRegistry::get_providers_for_check`].
pub fn candidate_rank(
    info: &ProviderInfo,
    check_type: CheckType,
    locale: &str,
    tier: ServiceTier,
) -> Option<CandidateRank> {
    if !tier.allows(info.category) {
        return None;
    }
    let capability = info.capability_for(check_type)?;
    if !capability.supports_locale(locale) {
        return None;
    }
    Some(CandidateRank {
        cost_tier: capability.cost_tier,
        unreliability: 1.0 - capability.reliability_score,
    })
}

/// Rank bare provider metadata, best first.
pub fn rank_infos<'a>(
    infos: &'a [ProviderInfo],
    check_type: CheckType,
    locale: &str,
    tier: ServiceTier,
) -> Vec<(&'a ProviderInfo, CandidateRank)> {
    let mut ranked: Vec<_> = infos
        .iter()
        .filter_map(|info| candidate_rank(info, check_type, locale, tier).map(|r| (info, r)))
        .collect();
    ranked.sort_by(|a, b| a.1.compare(&b.1));
    ranked
}

/// Registry of providers and their cached health.
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    health: DashMap<String, ProviderHealth>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            health: DashMap::new(),
        }
    }

    /// Register a provider. Fails if the id is already taken.
    pub fn register(&self, provider: Arc<dyn Provider>) -> GatewayResult<()> {
        let mut providers = self.providers.write().expect("provider registry lock poisoned");
        let id = provider.id().to_string();
        if providers.iter().any(|p| p.id() == id) {
            return Err(GatewayError::DuplicateProvider(id));
        }
        tracing::info!(
            provider = %id,
            category = ?provider.info().category,
            capabilities = provider.info().capabilities.len(),
            "Provider registered"
        );
        providers.push(provider);
        Ok(())
    }

    /// Remove a provider and its cached health.
    pub fn unregister(&self, provider_id: &str) -> Option<Arc<dyn Provider>> {
        let mut providers = self.providers.write().expect("provider registry lock poisoned");
        let index = providers.iter().position(|p| p.id() == provider_id)?;
        self.health.remove(provider_id);
        tracing::info!(provider = %provider_id, "Provider unregistered");
        Some(providers.remove(index))
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .iter()
            .find(|p| p.id() == provider_id)
            .cloned()
    }

    /// All providers in registration order.
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.read().expect("provider registry lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.providers.read().expect("provider registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Providers able to serve the check, best first.
    pub fn get_providers_for_check(
        &self,
        check_type: CheckType,
        locale: &str,
        tier: ServiceTier,
        healthy_only: bool,
    ) -> Vec<Arc<dyn Provider>> {
        let providers = self.providers.read().expect("provider registry lock poisoned");
        let mut ranked: Vec<(Arc<dyn Provider>, CandidateRank)> = providers
            .iter()
            .filter(|p| !healthy_only || self.is_routable(p.id()))
            .filter_map(|p| {
                candidate_rank(p.info(), check_type, locale, tier).map(|rank| (p.clone(), rank))
            })
            .collect();
        drop(providers);

        ranked.sort_by(|a, b| a.1.compare(&b.1));

        tracing::debug!(
            check_type = %check_type,
            locale = %locale,
            tier = %tier,
            candidates = ranked.len(),
            "Ranked providers for check"
        );
        ranked.into_iter().map(|(p, _)| p).collect()
    }

    /// Best provider for the check.
    pub fn get_provider_for_check(
        &self,
        check_type: CheckType,
        locale: &str,
        tier: ServiceTier,
        healthy_only: bool,
    ) -> GatewayResult<Arc<dyn Provider>> {
        self.get_providers_for_check(check_type, locale, tier, healthy_only)
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoProviderAvailable {
                check_type,
                locale: locale.to_string(),
                tier,
            })
    }

    /// Overwrite the cached health entry for a provider.
    pub fn update_provider_health(&self, health: ProviderHealth) {
        let previous = self
            .health
            .insert(health.provider_id.clone(), health.clone())
            .map(|h| h.status);
        if previous != Some(health.status) {
            tracing::info!(
                provider = %health.provider_id,
                from = ?previous,
                to = ?health.status,
                "Provider health changed"
            );
        }
        metrics::record_provider_health(&health.provider_id, health.status);
    }

    pub fn provider_health(&self, provider_id: &str) -> Option<ProviderHealth> {
        self.health.get(provider_id).map(|h| h.value().clone())
    }

    pub fn all_health(&self) -> Vec<ProviderHealth> {
        self.health.iter().map(|h| h.value().clone()).collect()
    }

    fn is_routable(&self, provider_id: &str) -> bool {
        self.health
            .get(provider_id)
            .map(|h| h.status.is_routable())
            .unwrap_or(true)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.providers().iter().map(|p| p.id().to_string()).collect();
        f.debug_struct("ProviderRegistry").field("providers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::{
        CheckResult, HealthCheckResult, ProviderCapability, ProviderCategory,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubProvider {
        info: ProviderInfo,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn info(&self) -> &ProviderInfo {
            &self.info
        }

        async fn execute_check(&self, _: CheckType, _: &Value, _: &str) -> CheckResult {
            CheckResult::failure("STUB", "not used", false)
        }

        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                status: HealthStatus::Healthy,
                latency_ms: 0,
                success_rate: 1.0,
            }
        }
    }

    fn stub(
        id: &str,
        category: ProviderCategory,
        tier: CostTier,
        reliability: f64,
    ) -> Arc<dyn Provider> {
        let info = ProviderInfo::new(id, category).with_capability(
            ProviderCapability::new(CheckType::CriminalNational, tier, reliability)
                .with_locales(["US"]),
        );
        Arc::new(StubProvider { info })
    }

    fn ids(providers: &[Arc<dyn Provider>]) -> Vec<&str> {
        providers.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ProviderRegistry::new();
        registry.register(stub("a", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();
        let err = registry
            .register(stub("a", ProviderCategory::Core, CostTier::Low, 0.9))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateProvider(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ranking_cost_then_reliability() {
        let registry = ProviderRegistry::new();
        registry.register(stub("b", ProviderCategory::Core, CostTier::Medium, 0.99)).unwrap();
        registry.register(stub("a", ProviderCategory::Core, CostTier::Low, 0.95)).unwrap();
        registry.register(stub("c", ProviderCategory::Core, CostTier::Low, 0.99)).unwrap();

        let ranked = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            true,
        );
        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let registry = ProviderRegistry::new();
        registry.register(stub("first", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();
        registry.register(stub("second", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();

        let ranked = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            true,
        );
        assert_eq!(ids(&ranked), vec!["first", "second"]);
    }

    #[test]
    fn test_tier_and_locale_filtering() {
        let registry = ProviderRegistry::new();
        registry.register(stub("core", ProviderCategory::Core, CostTier::Medium, 0.9)).unwrap();
        registry.register(stub("premium", ProviderCategory::Premium, CostTier::Low, 0.9)).unwrap();

        let standard = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            true,
        );
        assert_eq!(ids(&standard), vec!["core"]);

        let enhanced = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Enhanced,
            true,
        );
        assert_eq!(ids(&enhanced), vec!["premium", "core"]);

        let canada = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "CA",
            ServiceTier::Enhanced,
            true,
        );
        assert!(canada.is_empty());

        let credit = registry.get_providers_for_check(
            CheckType::CreditReport,
            "US",
            ServiceTier::Enhanced,
            true,
        );
        assert!(credit.is_empty());
    }

    #[test]
    fn test_health_filtering() {
        let registry = ProviderRegistry::new();
        registry.register(stub("a", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();
        registry.register(stub("b", ProviderCategory::Core, CostTier::Medium, 0.9)).unwrap();

        registry.update_provider_health(
            ProviderHealth::healthy("a").with_status(HealthStatus::Unhealthy),
        );
        registry.update_provider_health(
            ProviderHealth::healthy("b").with_status(HealthStatus::Degraded),
        );

        let healthy = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            true,
        );
        assert_eq!(ids(&healthy), vec!["b"]);

        let all = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            false,
        );
        assert_eq!(ids(&all), vec!["a", "b"]);

        // Last write wins.
        registry.update_provider_health(ProviderHealth::healthy("a"));
        let healthy = registry.get_providers_for_check(
            CheckType::CriminalNational,
            "US",
            ServiceTier::Standard,
            true,
        );
        assert_eq!(ids(&healthy), vec!["a", "b"]);
    }

    #[test]
    fn test_get_provider_for_check() {
        let registry = ProviderRegistry::new();
        let err = registry
            .get_provider_for_check(CheckType::CriminalNational, "US", ServiceTier::Standard, true)
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::NoProviderAvailable { .. }));

        registry.register(stub("a", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();
        let best = registry
            .get_provider_for_check(CheckType::CriminalNational, "US", ServiceTier::Standard, true)
            .unwrap();
        assert_eq!(best.id(), "a");
    }

    #[test]
    fn test_unregister_drops_health() {
        let registry = ProviderRegistry::new();
        registry.register(stub("a", ProviderCategory::Core, CostTier::Low, 0.9)).unwrap();
        registry.update_provider_health(ProviderHealth::healthy("a"));

        assert!(registry.unregister("a").is_some());
        assert!(registry.provider_health("a").is_none());
        assert!(registry.unregister("a").is_none());
    }

    #[test]
    fn test_rank_infos() {
        let infos = vec![
            ProviderInfo::new("b", ProviderCategory::Core).with_capability(ProviderCapability::new(
                CheckType::CreditReport,
                CostTier::Medium,
                0.99,
            )),
            ProviderInfo::new("a", ProviderCategory::Core).with_capability(ProviderCapability::new(
                CheckType::CreditReport,
                CostTier::Low,
                0.95,
            )),
        ];
        let ranked = rank_infos(&infos, CheckType::CreditReport, "US", ServiceTier::Standard);
        let order: Vec<&str> = ranked.iter().map(|(i, _)| i.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
