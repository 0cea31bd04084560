//! Tenant-aware response cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cache::store::{CacheStore, MemoryCacheStore};
use crate::cache::types::{CacheEntry, DataOrigin, Freshness, FreshnessPolicy};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::providers::types::{CheckType, NormalizedData};

/// A cache hit and how fresh it was when read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub entry: CacheEntry,
    pub freshness: Freshness,
}

/// Cache of provider results keyed by entity, provider and check type.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    policy: FreshnessPolicy,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: FreshnessPolicy) -> Self {
        Self { store, policy }
    }

    /// In-memory cache with the default freshness policy.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()), FreshnessPolicy::default())
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    pub fn store_backend(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: CheckType,
        tenant_id: Option<&str>,
        include_stale: bool,
    ) -> GatewayResult<Option<CacheLookup>> {
        self.get_at(entity_id, provider_id, check_type, tenant_id, include_stale, Utc::now())
            .await
    }

    /// Newest FRESH visible entry, else (with `include_stale`) the newest
    /// STALE visible entry.
    pub async fn get_at(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: CheckType,
        tenant_id: Option<&str>,
        include_stale: bool,
        now: DateTime<Utc>,
    ) -> GatewayResult<Option<CacheLookup>> {
        let entries = self
            .store
            .find_for_check(entity_id, provider_id, check_type)
            .await?;

        let mut stale = None;
        for entry in entries.into_iter().filter(|e| e.is_visible_to(tenant_id)) {
            match entry.freshness_at(now) {
                Freshness::Fresh => {
                    metrics::record_cache_lookup("fresh");
                    return Ok(Some(CacheLookup {
                        entry,
                        freshness: Freshness::Fresh,
                    }));
                }
                Freshness::Stale if stale.is_none() => stale = Some(entry),
                _ => {}
            }
        }

        match stale {
            Some(entry) if include_stale => {
                metrics::record_cache_lookup("stale");
                Ok(Some(CacheLookup {
                    entry,
                    freshness: Freshness::Stale,
                }))
            }
            _ => {
                metrics::record_cache_lookup("miss");
                Ok(None)
            }
        }
    }

    pub async fn store(
        &self,
        entity_id: &str,
        provider_id: &str,
        check_type: CheckType,
        payload: NormalizedData,
        tenant_id: Option<&str>,
        origin: DataOrigin,
    ) -> GatewayResult<CacheEntry> {
        self.store_at(entity_id, provider_id, check_type, payload, tenant_id, origin, Utc::now())
            .await
    }

    /// Append a new entry. Earlier entries for the same key are untouched.
    ///
    /// Paid results are stored without a tenant so every tenant can reuse
    /// them. Customer-provided results must name their tenant.
    #[allow(clippy::too_many_arguments)]
    pub async fn store_at(
        &self,
        entity_id: &str,
        provider_id: &str,
        check_type: CheckType,
        payload: NormalizedData,
        tenant_id: Option<&str>,
        origin: DataOrigin,
        now: DateTime<Utc>,
    ) -> GatewayResult<CacheEntry> {
        let tenant_id = match origin {
            DataOrigin::PaidExternal => None,
            DataOrigin::CustomerProvided => match tenant_id {
                Some(t) => Some(t.to_string()),
                None => {
                    return Err(GatewayError::InvalidInput(
                        "customer-provided cache entries require a tenant".to_string(),
                    ))
                }
            },
        };

        let (fresh_until, stale_until) = self.policy.window_for(check_type.category()).bounds(now);
        let entry = CacheEntry {
            id: Uuid::new_v4(),
            entity_id: entity_id.to_string(),
            provider_id: provider_id.to_string(),
            check_type,
            acquired_at: now,
            fresh_until,
            stale_until,
            data_origin: origin,
            tenant_id,
            payload,
        };

        self.store.insert(entry.clone()).await?;
        tracing::debug!(
            entity = %entity_id,
            provider = %provider_id,
            check_type = %check_type,
            fresh_until = %fresh_until,
            "Cached provider result"
        );
        Ok(entry)
    }

    pub async fn invalidate(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: Option<CheckType>,
    ) -> GatewayResult<usize> {
        self.invalidate_at(entity_id, provider_id, check_type, Utc::now())
            .await
    }

    /// Expire every matching entry. Returns how many were touched.
    pub async fn invalidate_at(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: Option<CheckType>,
        now: DateTime<Utc>,
    ) -> GatewayResult<usize> {
        let entries = self.store.find_all(entity_id, provider_id).await?;
        let mut count = 0;
        for entry in entries
            .iter()
            .filter(|e| check_type.map_or(true, |c| e.check_type == c))
        {
            if self.store.mark_expired(entry.id, now).await? {
                count += 1;
            }
        }
        tracing::info!(entity = %entity_id, count, "Invalidated cache entries");
        Ok(count)
    }

    /// Every entry for an entity, newest first, regardless of freshness.
    pub async fn entries_for(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
    ) -> GatewayResult<Vec<CacheEntry>> {
        self.store.find_all(entity_id, provider_id).await
    }

    pub async fn purge_expired(&self) -> GatewayResult<usize> {
        self.store.purge_expired(Utc::now()).await
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn payload(v: &str) -> NormalizedData {
        let mut map = NormalizedData::new();
        map.insert("status".to_string(), json!(v));
        map
    }

    #[tokio::test]
    async fn test_fresh_then_stale_then_expired() {
        let cache = ResponseCache::in_memory();
        let t0 = Utc::now();
        cache
            .store_at(
                "e1",
                "a",
                CheckType::CriminalNational,
                payload("clear"),
                None,
                DataOrigin::PaidExternal,
                t0,
            )
            .await
            .unwrap();

        let hit = cache
            .get_at(
                "e1",
                None,
                CheckType::CriminalNational,
                None,
                false,
                t0 + ChronoDuration::days(3),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.freshness, Freshness::Fresh);

        let day10 = t0 + ChronoDuration::days(10);
        assert!(cache
            .get_at("e1", None, CheckType::CriminalNational, None, false, day10)
            .await
            .unwrap()
            .is_none());
        let stale = cache
            .get_at("e1", None, CheckType::CriminalNational, None, true, day10)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stale.freshness, Freshness::Stale);

        assert!(cache
            .get_at(
                "e1",
                None,
                CheckType::CriminalNational,
                None,
                true,
                t0 + ChronoDuration::days(25),
            )
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fresh_preferred_over_newer_stale_across_providers() {
        let cache = ResponseCache::in_memory();
        let now = Utc::now();
        cache
            .store_at(
                "e1",
                "a",
                CheckType::CreditReport,
                payload("a"),
                None,
                DataOrigin::PaidExternal,
                now,
            )
            .await
            .unwrap();

        let hit = cache
            .get_at("e1", Some("b"), CheckType::CreditReport, None, true, now)
            .await
            .unwrap();
        assert!(hit.is_none());

        let hit = cache
            .get_at("e1", None, CheckType::CreditReport, None, false, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.entry.provider_id, "a");
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let cache = ResponseCache::in_memory();
        cache
            .store(
                "e1",
                "a",
                CheckType::SsnTrace,
                payload("mine"),
                Some("t1"),
                DataOrigin::CustomerProvided,
            )
            .await
            .unwrap();

        assert!(cache
            .get("e1", None, CheckType::SsnTrace, Some("t1"), false)
            .await
            .unwrap()
            .is_some());
        assert!(cache
            .get("e1", None, CheckType::SsnTrace, Some("t2"), false)
            .await
            .unwrap()
            .is_none());

        let shared = cache
            .store(
                "e1",
                "a",
                CheckType::CreditReport,
                payload("paid"),
                Some("t1"),
                DataOrigin::PaidExternal,
            )
            .await
            .unwrap();
        assert_eq!(shared.tenant_id, None);
        assert!(cache
            .get("e1", None, CheckType::CreditReport, Some("t2"), false)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_customer_provided_requires_tenant() {
        let cache = ResponseCache::in_memory();
        let err = cache
            .store("e1", "a", CheckType::SsnTrace, payload("x"), None, DataOrigin::CustomerProvided)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalidate_by_check_type() {
        let cache = ResponseCache::in_memory();
        let now = Utc::now();
        for check in [CheckType::CreditReport, CheckType::SsnTrace] {
            cache
                .store_at("e1", "a", check, payload("x"), None, DataOrigin::PaidExternal, now)
                .await
                .unwrap();
        }

        let later = now + ChronoDuration::seconds(1);
        let count = cache
            .invalidate_at("e1", None, Some(CheckType::CreditReport), later)
            .await
            .unwrap();
        assert_eq!(count, 1);

        assert!(cache
            .get_at("e1", None, CheckType::CreditReport, None, true, later)
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .get_at("e1", None, CheckType::SsnTrace, None, false, later)
            .await
            .unwrap()
            .is_some());
        assert_eq!(cache.entries_for("e1", None).await.unwrap().len(), 2);
    }
}
