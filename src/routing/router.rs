//! Request routing with caching, fallback and retries.
//!
//! # Responsibilities
//! - Serve from cache when a usable entry exists
//! - Walk ranked providers, skipping open circuits and empty buckets
//! - Retry retryable failures in place with jittered backoff
//! - Persist wins to the cache and the cost ledger
//! - Classify exhaustion into a structured failure
//!
//! # Design Decisions
//! - Provider order is deterministic; retries on one provider are sequential
//! - Each request records at most one circuit outcome and one passive
//!   health observation per provider
//! - Post-win writes run in their own task so caller cancellation cannot
//!   drop them halfway
//! - Router settings are swapped atomically; registries keep their state

use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::cache::response_cache::{CacheLookup, ResponseCache};
use crate::cache::store::MemoryCacheStore;
use crate::cache::types::{DataOrigin, Freshness};
use crate::config::{GatewayConfig, RouterConfig};
use crate::costs::ledger::CostLedger;
use crate::costs::pricing::CostEstimates;
use crate::costs::store::MemoryCostStore;
use crate::costs::types::BudgetStatus;
use crate::health::passive::HealthTracker;
use crate::observability::metrics;
use crate::providers::registry::ProviderRegistry;
use crate::providers::types::CheckResult;
use crate::providers::Provider;
use crate::rate_limit::registry::RateLimiterRegistry;
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::{with_deadline, TimedOut};
use crate::routing::types::{
    AttemptError, FailureReason, ProviderFailure, RouteFailure, RoutedRequest, RoutedResult,
};

/// Coordinates cache, providers, breakers, buckets and the ledger for each
/// request.
pub struct RequestRouter {
    registry: Arc<ProviderRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    limiters: Arc<RateLimiterRegistry>,
    cache: Arc<ResponseCache>,
    ledger: Arc<CostLedger>,
    health: Option<Arc<HealthTracker>>,
    config: ArcSwap<RouterConfig>,
}

/// Outcome of walking a single provider.
enum ProviderOutcome {
    Won(CheckResult),
    SkippedCircuit,
    SkippedRateLimit,
    Failed,
}

impl RequestRouter {
    pub fn builder(registry: Arc<ProviderRegistry>) -> RequestRouterBuilder {
        RequestRouterBuilder::new(registry)
    }

    /// Router with in-memory stores, wired from a full gateway config.
    pub fn from_config(config: &GatewayConfig, registry: Arc<ProviderRegistry>) -> Self {
        let cache = ResponseCache::new(
            Arc::new(MemoryCacheStore::new()),
            config.cache.freshness.clone(),
        );
        let ledger = CostLedger::new(
            Arc::new(MemoryCostStore::new()),
            CostEstimates::from_config(&config.costs),
        )
        .with_budgets(config.budgets.iter().cloned());
        let tracker = HealthTracker::new(registry.clone(), config.health_check.clone());

        Self::builder(registry)
            .config(config.router.clone())
            .circuit_breakers(Arc::new(CircuitBreakerRegistry::new(
                config.circuit_breaker.clone(),
            )))
            .rate_limiters(Arc::new(RateLimiterRegistry::new(config.rate_limit.clone())))
            .cache(Arc::new(cache))
            .ledger(Arc::new(ledger))
            .health_tracker(Arc::new(tracker))
            .build()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn rate_limiters(&self) -> &Arc<RateLimiterRegistry> {
        &self.limiters
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn health_tracker(&self) -> Option<&Arc<HealthTracker>> {
        self.health.as_ref()
    }

    /// Current router settings.
    pub fn config(&self) -> Arc<RouterConfig> {
        self.config.load_full()
    }

    /// Swap router settings. In-flight requests keep the settings they
    /// started with.
    pub fn apply_config(&self, config: RouterConfig) {
        tracing::info!(
            max_retries = config.max_retries,
            attempt_timeout_ms = config.attempt_timeout_ms,
            accept_stale = config.accept_stale,
            "Applying router config"
        );
        self.config.store(Arc::new(config));
    }

    /// Route one request to cached data or the best available provider.
    pub async fn route_request(&self, request: RoutedRequest) -> RoutedResult {
        let start = Instant::now();
        let config = self.config.load_full();

        if let Some(hit) = self.lookup_cache(&request, config.accept_stale).await {
            let result = self.serve_from_cache(&request, hit, start).await;
            metrics::record_route("cache_hit", result.elapsed);
            return result;
        }

        let candidates = self.registry.get_providers_for_check(
            request.check_type,
            &request.locale,
            request.tier,
            true,
        );
        if candidates.is_empty() {
            tracing::warn!(
                check_type = %request.check_type,
                locale = %request.locale,
                tier = %request.tier,
                "No provider available"
            );
            let failure = RouteFailure {
                reason: FailureReason::NoProvider,
                message: format!(
                    "no healthy provider supports {} in locale {} ({})",
                    request.check_type, request.locale, request.tier
                ),
                provider_errors: Vec::new(),
            };
            let mut result = RoutedResult::failed(request.check_type, failure);
            result.elapsed = start.elapsed();
            metrics::record_route(FailureReason::NoProvider.as_str(), result.elapsed);
            return result;
        }

        let budget = self.advisory_budget(&request).await;
        let policy = RetryPolicy::from_config(&config);

        let mut attempts = 0u32;
        let mut errors: Vec<ProviderFailure> = Vec::new();
        let mut circuit_skips = 0usize;
        let mut rate_limit_skips = 0usize;

        for provider in &candidates {
            let outcome = self
                .try_provider(provider, &request, &config, &policy, &mut attempts, &mut errors)
                .await;

            match outcome {
                ProviderOutcome::Won(result) => {
                    let provider_id = provider.id().to_string();
                    self.persist_win(&request, &provider_id, &result).await;

                    let elapsed = start.elapsed();
                    tracing::info!(
                        provider = %provider_id,
                        check_type = %request.check_type,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Request routed"
                    );
                    metrics::record_route("success", elapsed);
                    return RoutedResult {
                        success: true,
                        provider_id: Some(provider_id),
                        check_type: request.check_type,
                        data: result.normalized_data,
                        attempts,
                        elapsed,
                        cache_hit: false,
                        freshness: None,
                        cost_incurred: result.cost_incurred,
                        cost_saved: Decimal::ZERO,
                        budget,
                        failure: None,
                    };
                }
                ProviderOutcome::SkippedCircuit => circuit_skips += 1,
                ProviderOutcome::SkippedRateLimit => rate_limit_skips += 1,
                ProviderOutcome::Failed => {}
            }
        }

        let reason = if circuit_skips == candidates.len() {
            FailureReason::AllCircuitsOpen
        } else if rate_limit_skips == candidates.len() {
            FailureReason::AllRateLimited
        } else {
            FailureReason::AllProvidersFailed
        };

        let elapsed = start.elapsed();
        tracing::warn!(
            check_type = %request.check_type,
            reason = %reason,
            candidates = candidates.len(),
            attempts,
            "Routing exhausted all providers"
        );
        metrics::record_route(reason.as_str(), elapsed);

        let failure = RouteFailure {
            reason,
            message: format!(
                "{} candidate provider(s) exhausted for {}",
                candidates.len(),
                request.check_type
            ),
            provider_errors: errors,
        };
        let mut result = RoutedResult::failed(request.check_type, failure);
        result.attempts = attempts;
        result.elapsed = elapsed;
        result.budget = budget;
        result
    }

    /// Route many requests. Results keep the input order.
    ///
    /// With `parallel`, up to `batch_concurrency` requests are in flight at
    /// once; each one runs the full routing sequence independently.
    pub async fn route_batch(
        &self,
        requests: Vec<RoutedRequest>,
        parallel: bool,
    ) -> Vec<RoutedResult> {
        if !parallel {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.route_request(request).await);
            }
            return results;
        }

        let concurrency = self.config.load().batch_concurrency.max(1);
        stream::iter(requests)
            .map(|request| self.route_request(request))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn lookup_cache(
        &self,
        request: &RoutedRequest,
        accept_stale: bool,
    ) -> Option<CacheLookup> {
        match self
            .cache
            .get(
                &request.entity_id,
                None,
                request.check_type,
                Some(request.tenant_id.as_str()),
                accept_stale,
            )
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(
                    entity = %request.entity_id,
                    error = %e,
                    "Cache lookup failed, routing to providers"
                );
                None
            }
        }
    }

    async fn serve_from_cache(
        &self,
        request: &RoutedRequest,
        hit: CacheLookup,
        start: Instant,
    ) -> RoutedResult {
        let CacheLookup { entry, freshness } = hit;

        let mut saved = Decimal::ZERO;
        if freshness == Freshness::Fresh {
            saved = self.ledger.estimated_cost(request.check_type);
            if let Err(e) = self
                .ledger
                .record_cache_savings(
                    &request.tenant_id,
                    &entry.provider_id,
                    request.check_type,
                    saved,
                )
                .await
            {
                tracing::warn!(
                    tenant = %request.tenant_id,
                    error = %e,
                    "Failed to record cache savings"
                );
            }
        }

        tracing::debug!(
            entity = %request.entity_id,
            provider = %entry.provider_id,
            freshness = freshness.as_str(),
            "Serving from cache"
        );

        RoutedResult {
            success: true,
            provider_id: Some(entry.provider_id),
            check_type: request.check_type,
            data: Some(entry.payload),
            attempts: 0,
            elapsed: start.elapsed(),
            cache_hit: true,
            freshness: Some(freshness),
            cost_incurred: Decimal::ZERO,
            cost_saved: saved,
            budget: None,
            failure: None,
        }
    }

    async fn advisory_budget(&self, request: &RoutedRequest) -> Option<BudgetStatus> {
        let estimate = self.ledger.estimated_cost(request.check_type);
        match self.ledger.check_budget(&request.tenant_id, estimate).await {
            Ok(status) => {
                if status.is_exceeded() {
                    tracing::warn!(
                        tenant = %request.tenant_id,
                        hard_limit = status.hard_limit,
                        "Tenant budget exceeded"
                    );
                } else if status.is_warning() {
                    tracing::warn!(tenant = %request.tenant_id, "Tenant budget near limit");
                }
                Some(status)
            }
            Err(e) => {
                tracing::warn!(tenant = %request.tenant_id, error = %e, "Budget check failed");
                None
            }
        }
    }

    /// Run one provider through circuit, rate limit and the retry loop.
    async fn try_provider(
        &self,
        provider: &Arc<dyn Provider>,
        request: &RoutedRequest,
        config: &RouterConfig,
        policy: &RetryPolicy,
        attempts: &mut u32,
        errors: &mut Vec<ProviderFailure>,
    ) -> ProviderOutcome {
        let provider_id = provider.id();

        let Some(permit) = self.breakers.get(provider_id).try_acquire() else {
            tracing::debug!(provider = %provider_id, "Skipping provider: circuit open");
            metrics::record_provider_attempt(provider_id, "circuit_open");
            errors.push(ProviderFailure {
                provider_id: provider_id.to_string(),
                error: AttemptError::CircuitOpen,
            });
            return ProviderOutcome::SkippedCircuit;
        };

        let admission = self
            .limiters
            .acquire(provider_id, config.tokens_per_request, config.wait_for_rate_limit)
            .await;
        if !admission.allowed {
            tracing::debug!(
                provider = %provider_id,
                retry_after_ms = admission.retry_after.as_millis() as u64,
                "Skipping provider: rate limited"
            );
            metrics::record_provider_attempt(provider_id, "rate_limited");
            errors.push(ProviderFailure {
                provider_id: provider_id.to_string(),
                error: AttemptError::RateLimited {
                    retry_after: admission.retry_after,
                },
            });
            return ProviderOutcome::SkippedRateLimit;
        }

        let timeout = config.attempt_timeout();
        let mut attempt = 0u32;
        loop {
            *attempts += 1;
            let call =
                provider.execute_check(request.check_type, &request.subject, &request.locale);
            let (error, retryable) = match with_deadline(timeout, call).await {
                Ok(result) if result.success => {
                    metrics::record_provider_attempt(provider_id, "success");
                    permit.record_success();
                    self.observe_health(provider_id, true);
                    return ProviderOutcome::Won(result);
                }
                Ok(result) => {
                    metrics::record_provider_attempt(provider_id, "error");
                    let retryable = result.retryable;
                    let error = AttemptError::Provider {
                        code: result.error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
                        message: result.error_message.unwrap_or_default(),
                        retryable,
                    };
                    (error, retryable)
                }
                Err(TimedOut(after)) => {
                    metrics::record_provider_attempt(provider_id, "timeout");
                    (AttemptError::Timeout { after }, true)
                }
            };

            tracing::warn!(
                provider = %provider_id,
                attempt = attempt + 1,
                error = %error,
                retryable,
                "Provider attempt failed"
            );
            errors.push(ProviderFailure {
                provider_id: provider_id.to_string(),
                error,
            });

            if !policy.should_retry(attempt, retryable) {
                permit.record_failure();
                self.observe_health(provider_id, false);
                return ProviderOutcome::Failed;
            }

            let delay = policy.delay_for(attempt);
            tracing::info!(
                provider = %provider_id,
                attempt = attempt + 1,
                delay = ?delay,
                "Retrying provider"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One passive observation per provider visit, alongside the circuit
    /// outcome.
    fn observe_health(&self, provider_id: &str, success: bool) {
        if let Some(tracker) = &self.health {
            if success {
                tracker.record_success(provider_id);
            } else {
                tracker.record_failure(provider_id);
            }
        }
    }

    /// Cache the payload and record the cost.
    async fn persist_win(&self, request: &RoutedRequest, provider_id: &str, result: &CheckResult) {
        let cache = self.cache.clone();
        let ledger = self.ledger.clone();
        let entity_id = request.entity_id.clone();
        let tenant_id = request.tenant_id.clone();
        let screening_id = request.screening_id.clone();
        let check_type = request.check_type;
        let provider_id = provider_id.to_string();
        let payload = result.normalized_data.clone().unwrap_or_default();
        let amount = result.cost_incurred;

        let task = tokio::spawn(async move {
            if let Err(e) = cache
                .store(
                    &entity_id,
                    &provider_id,
                    check_type,
                    payload,
                    Some(tenant_id.as_str()),
                    DataOrigin::PaidExternal,
                )
                .await
            {
                tracing::warn!(
                    provider = %provider_id,
                    error = %e,
                    "Failed to cache provider result"
                );
            }
            if let Err(e) = ledger
                .record_cost(
                    &tenant_id,
                    &provider_id,
                    check_type,
                    amount,
                    screening_id.as_deref(),
                    false,
                )
                .await
            {
                tracing::error!(
                    provider = %provider_id,
                    tenant = %tenant_id,
                    error = %e,
                    "Failed to record cost"
                );
            }
        });

        if let Err(e) = task.await {
            tracing::error!(error = %e, "Post-win persistence task failed");
        }
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("registry", &self.registry)
            .field("config", &self.config.load_full())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestRouter`]. Unset collaborators get in-memory defaults.
pub struct RequestRouterBuilder {
    registry: Arc<ProviderRegistry>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    limiters: Option<Arc<RateLimiterRegistry>>,
    cache: Option<Arc<ResponseCache>>,
    ledger: Option<Arc<CostLedger>>,
    health: Option<Arc<HealthTracker>>,
    config: RouterConfig,
}

impl RequestRouterBuilder {
    fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            breakers: None,
            limiters: None,
            cache: None,
            ledger: None,
            health: None,
            config: RouterConfig::default(),
        }
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn circuit_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn rate_limiters(mut self, limiters: Arc<RateLimiterRegistry>) -> Self {
        self.limiters = Some(limiters);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ledger(mut self, ledger: Arc<CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn health_tracker(mut self, tracker: Arc<HealthTracker>) -> Self {
        self.health = Some(tracker);
        self
    }

    pub fn build(self) -> RequestRouter {
        RequestRouter {
            registry: self.registry,
            breakers: self.breakers.unwrap_or_default(),
            limiters: self.limiters.unwrap_or_default(),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(ResponseCache::in_memory())),
            ledger: self
                .ledger
                .unwrap_or_else(|| Arc::new(CostLedger::in_memory())),
            health: self.health,
            config: ArcSwap::from_pointee(self.config),
        }
    }
}
