//! Shared mock providers and helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use verification_gateway::cache::{CacheEntry, CacheStore, MemoryCacheStore};

use verification_gateway::config::GatewayConfig;
use verification_gateway::health::HealthStatus;
use verification_gateway::providers::types::{
    CheckResult, CheckType, CostTier, HealthCheckResult, NormalizedData, ProviderCapability,
    ProviderCategory, ProviderInfo, ServiceTier,
};
use verification_gateway::providers::{Provider, ProviderRegistry};
use verification_gateway::routing::{RequestRouter, RoutedRequest};
use verification_gateway::GatewayResult;

pub const PROVIDER_COST: Decimal = dec!(12.50);

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail { retryable: bool },
    /// Sleep before succeeding; long enough sleeps trip the attempt timeout.
    Hang(Duration),
}

/// A provider that replays a script, then repeats its last step.
pub struct ScriptedProvider {
    info: ProviderInfo,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(info: ProviderInfo, steps: Vec<Step>) -> Arc<Self> {
        let last = steps.last().cloned().unwrap_or(Step::Succeed);
        Arc::new(Self {
            info,
            steps: Mutex::new(steps.into()),
            last: Mutex::new(last),
            calls: AtomicU32::new(0),
        })
    }

    /// Core provider for criminal and credit checks in the US.
    pub fn core(id: &str, tier: CostTier, reliability: f64, steps: Vec<Step>) -> Arc<Self> {
        Self::new(info(id, ProviderCategory::Core, tier, reliability), steps)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        match steps.pop_front() {
            Some(step) => {
                *self.last.lock().unwrap() = step.clone();
                step
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn execute_check(
        &self,
        check_type: CheckType,
        subject: &Value,
        _locale: &str,
    ) -> CheckResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Succeed => {
                CheckResult::success(payload(&self.info.id, check_type, subject), PROVIDER_COST)
            }
            Step::Fail { retryable } => {
                CheckResult::failure("UPSTREAM_ERROR", "scripted failure", retryable)
            }
            Step::Hang(delay) => {
                tokio::time::sleep(delay).await;
                CheckResult::success(payload(&self.info.id, check_type, subject), PROVIDER_COST)
            }
        }
    }

    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            status: HealthStatus::Healthy,
            latency_ms: 1,
            success_rate: 1.0,
        }
    }
}

/// Sleeps for `subject.delay_ms`, then echoes the subject back.
pub struct EchoProvider {
    info: ProviderInfo,
}

impl EchoProvider {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            info: info(id, ProviderCategory::Core, CostTier::Low, 0.99),
        })
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn execute_check(
        &self,
        check_type: CheckType,
        subject: &Value,
        _locale: &str,
    ) -> CheckResult {
        let delay = subject.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        CheckResult::success(payload(&self.info.id, check_type, subject), Decimal::ONE)
    }

    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            status: HealthStatus::Healthy,
            latency_ms: 1,
            success_rate: 1.0,
        }
    }
}

pub fn info(
    id: &str,
    category: ProviderCategory,
    tier: CostTier,
    reliability: f64,
) -> ProviderInfo {
    let mut info = ProviderInfo::new(id, category);
    for check_type in [CheckType::CriminalNational, CheckType::CreditReport] {
        info = info.with_capability(
            ProviderCapability::new(check_type, tier, reliability).with_locales(["US"]),
        );
    }
    info
}

pub fn payload(provider_id: &str, check_type: CheckType, subject: &Value) -> NormalizedData {
    let mut data = NormalizedData::new();
    data.insert("provider".to_string(), json!(provider_id));
    data.insert("check_type".to_string(), json!(check_type.as_str()));
    data.insert("subject".to_string(), subject.clone());
    data
}

pub fn request(entity_id: &str, tenant_id: &str) -> RoutedRequest {
    RoutedRequest::new(
        CheckType::CriminalNational,
        json!({ "name": "Jane Doe" }),
        "US",
        entity_id,
        tenant_id,
        ServiceTier::Standard,
    )
}

/// Config with fast retries and health checks off.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.router.max_retries = 3;
    config.router.base_retry_delay_ms = 500;
    config.router.max_retry_delay_ms = 10_000;
    config.router.attempt_timeout_ms = 1_000;
    config.health_check.enabled = false;
    config
}

pub fn router_with(config: &GatewayConfig, providers: Vec<Arc<dyn Provider>>) -> RequestRouter {
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(provider).unwrap();
    }
    RequestRouter::from_config(config, registry)
}

/// Drive a provider's breaker open by recording failures directly.
pub fn open_circuit(router: &RequestRouter, provider_id: &str) {
    let breaker = router.circuit_breakers().get(provider_id);
    for _ in 0..breaker.settings().failure_threshold {
        breaker.record_failure();
    }
}

/// In-memory cache store whose writes take `insert_delay` to land.
pub struct SlowCacheStore {
    inner: MemoryCacheStore,
    insert_delay: Duration,
}

impl SlowCacheStore {
    pub fn new(insert_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCacheStore::new(),
            insert_delay,
        })
    }
}

#[async_trait]
impl CacheStore for SlowCacheStore {
    async fn insert(&self, entry: CacheEntry) -> GatewayResult<()> {
        tokio::time::sleep(self.insert_delay).await;
        self.inner.insert(entry).await
    }

    async fn find_for_check(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: CheckType,
    ) -> GatewayResult<Vec<CacheEntry>> {
        self.inner.find_for_check(entity_id, provider_id, check_type).await
    }

    async fn find_all(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
    ) -> GatewayResult<Vec<CacheEntry>> {
        self.inner.find_all(entity_id, provider_id).await
    }

    async fn mark_expired(&self, id: Uuid, at: DateTime<Utc>) -> GatewayResult<bool> {
        self.inner.mark_expired(id, at).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> GatewayResult<usize> {
        self.inner.purge_expired(now).await
    }
}
