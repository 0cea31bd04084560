//! Cost persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::costs::types::{CacheSavings, CostRecord};
use crate::error::GatewayResult;

/// Append-only storage for cost records and cache savings.
///
/// Ranges are half-open: `from <= timestamp < to`.
#[async_trait]
pub trait CostStore: Send + Sync {
    async fn append_cost(&self, record: CostRecord) -> GatewayResult<()>;

    async fn append_savings(&self, savings: CacheSavings) -> GatewayResult<()>;

    /// Sum of a tenant's recorded amounts in the range.
    async fn sum_costs(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Decimal>;

    async fn costs_in_range(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<CostRecord>>;

    async fn savings_in_range(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<CacheSavings>>;
}

#[derive(Debug, Default)]
pub struct MemoryCostStore {
    costs: RwLock<Vec<CostRecord>>,
    savings: RwLock<Vec<CacheSavings>>,
}

impl MemoryCostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_range(ts: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    from <= ts && ts < to
}

fn tenant_matches(filter: Option<&str>, tenant_id: &str) -> bool {
    filter.map_or(true, |t| t == tenant_id)
}

#[async_trait]
impl CostStore for MemoryCostStore {
    async fn append_cost(&self, record: CostRecord) -> GatewayResult<()> {
        self.costs.write().await.push(record);
        Ok(())
    }

    async fn append_savings(&self, savings: CacheSavings) -> GatewayResult<()> {
        self.savings.write().await.push(savings);
        Ok(())
    }

    async fn sum_costs(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Decimal> {
        Ok(self
            .costs
            .read()
            .await
            .iter()
            .filter(|r| r.tenant_id == tenant_id && in_range(r.timestamp, from, to))
            .map(|r| r.amount)
            .sum())
    }

    async fn costs_in_range(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<CostRecord>> {
        Ok(self
            .costs
            .read()
            .await
            .iter()
            .filter(|r| tenant_matches(tenant_id, &r.tenant_id) && in_range(r.timestamp, from, to))
            .cloned()
            .collect())
    }

    async fn savings_in_range(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<CacheSavings>> {
        Ok(self
            .savings
            .read()
            .await
            .iter()
            .filter(|s| tenant_matches(tenant_id, &s.tenant_id) && in_range(s.timestamp, from, to))
            .cloned()
            .collect())
    }
}
