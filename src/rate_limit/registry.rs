//! Per-provider token bucket registry.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::rate_limit::bucket::{RateLimitResult, TokenBucket};

/// Lazily-populated set of per-provider token buckets.
///
/// A provider without a bucket yet is treated as having a full one.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    buckets: DashMap<String, Arc<TokenBucket>>,
    config: RateLimitConfig,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Get or create the bucket for a provider.
    pub fn get(&self, provider_id: &str) -> Arc<TokenBucket> {
        if let Some(existing) = self.buckets.get(provider_id) {
            return existing.value().clone();
        }
        self.buckets
            .entry(provider_id.to_string())
            .or_insert_with(|| {
                Arc::new(TokenBucket::new(
                    provider_id,
                    &self.config.settings_for(provider_id),
                ))
            })
            .value()
            .clone()
    }

    /// Existing bucket, without creating one.
    pub fn peek(&self, provider_id: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.get(provider_id).map(|b| b.value().clone())
    }

    pub async fn acquire(&self, provider_id: &str, n: f64, wait: bool) -> RateLimitResult {
        self.get(provider_id).acquire(n, wait).await
    }

    /// Side-effect-free pre-flight check.
    pub fn check(&self, provider_id: &str, n: f64) -> RateLimitResult {
        match self.peek(provider_id) {
            Some(bucket) => bucket.check(n),
            None => {
                let settings = self.config.settings_for(provider_id);
                TokenBucket::new(provider_id, &settings).check(n)
            }
        }
    }

    /// Take `n` tokens or fail with [`GatewayError::RateLimited`].
    pub fn acquire_or_raise(&self, provider_id: &str, n: f64) -> GatewayResult<RateLimitResult> {
        let result = self.get(provider_id).try_acquire(n);
        if result.allowed {
            Ok(result)
        } else {
            Err(GatewayError::RateLimited {
                provider: provider_id.to_string(),
                retry_after: result.retry_after,
            })
        }
    }

    /// Available tokens per provider, ordered by provider id.
    pub fn snapshot(&self) -> Vec<(String, f64)> {
        let mut out: Vec<_> = self
            .buckets
            .iter()
            .map(|b| (b.key().clone(), b.value().available_tokens()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
