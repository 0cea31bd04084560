//! Cost ledger and budget enforcement.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::costs::pricing::CostEstimates;
use crate::costs::store::{CostStore, MemoryCostStore};
use crate::costs::types::{BudgetConfig, BudgetStatus, CacheSavings, CostRecord, CostSummary};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::providers::types::CheckType;

/// Records spend and savings, and checks tenants against their budgets.
pub struct CostLedger {
    store: Arc<dyn CostStore>,
    budgets: DashMap<String, BudgetConfig>,
    estimates: CostEstimates,
}

impl CostLedger {
    pub fn new(store: Arc<dyn CostStore>, estimates: CostEstimates) -> Self {
        Self {
            store,
            budgets: DashMap::new(),
            estimates,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCostStore::new()), CostEstimates::default())
    }

    pub fn with_budgets(self, budgets: impl IntoIterator<Item = BudgetConfig>) -> Self {
        for budget in budgets {
            self.set_budget(budget);
        }
        self
    }

    pub fn currency(&self) -> &str {
        self.estimates.currency()
    }

    /// Estimated cost of a check, used for savings and budget pre-checks.
    pub fn estimated_cost(&self, check_type: CheckType) -> Decimal {
        self.estimates.estimate(check_type)
    }

    pub fn set_budget(&self, budget: BudgetConfig) {
        self.budgets.insert(budget.tenant_id.clone(), budget);
    }

    pub fn budget(&self, tenant_id: &str) -> Option<BudgetConfig> {
        self.budgets.get(tenant_id).map(|b| b.value().clone())
    }

    pub fn remove_budget(&self, tenant_id: &str) -> Option<BudgetConfig> {
        self.budgets.remove(tenant_id).map(|(_, b)| b)
    }

    /// Append a cost record in the ledger's currency, stamped now.
    pub async fn record_cost(
        &self,
        tenant_id: &str,
        provider_id: &str,
        check_type: CheckType,
        amount: Decimal,
        query_id: Option<&str>,
        cache_hit: bool,
    ) -> GatewayResult<CostRecord> {
        let mut record =
            CostRecord::new(tenant_id, provider_id, check_type, amount, self.currency())
                .with_cache_hit(cache_hit);
        if let Some(query_id) = query_id {
            record = record.with_query_id(query_id);
        }
        self.record(record.clone()).await?;
        Ok(record)
    }

    /// Append a fully-formed cost record.
    pub async fn record(&self, record: CostRecord) -> GatewayResult<()> {
        metrics::record_cost(&record.provider_id, record.amount, record.cache_hit);
        tracing::debug!(
            tenant = %record.tenant_id,
            provider = %record.provider_id,
            check_type = %record.check_type,
            amount = %record.amount,
            cache_hit = record.cache_hit,
            "Recorded cost"
        );
        self.store.append_cost(record).await
    }

    pub async fn record_cache_savings(
        &self,
        tenant_id: &str,
        provider_id: &str,
        check_type: CheckType,
        amount_saved: Decimal,
    ) -> GatewayResult<CacheSavings> {
        let savings = CacheSavings {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            provider_id: provider_id.to_string(),
            check_type,
            amount_saved,
            currency: self.currency().to_string(),
            timestamp: Utc::now(),
        };
        self.store.append_savings(savings.clone()).await?;
        Ok(savings)
    }

    pub async fn check_budget(
        &self,
        tenant_id: &str,
        estimated_cost: Decimal,
    ) -> GatewayResult<BudgetStatus> {
        self.check_budget_at(tenant_id, estimated_cost, Utc::now())
            .await
    }

    /// Compare the tenant's spend in the current UTC day and month, plus
    /// `estimated_cost`, against its limits. Read-only.
    pub async fn check_budget_at(
        &self,
        tenant_id: &str,
        estimated_cost: Decimal,
        now: DateTime<Utc>,
    ) -> GatewayResult<BudgetStatus> {
        let Some(budget) = self.budget(tenant_id) else {
            return Ok(BudgetStatus::unlimited(tenant_id, estimated_cost));
        };

        let (day_start, day_end) = day_bounds(now);
        let (month_start, month_end) = month_bounds(now);
        let daily_used = self.store.sum_costs(tenant_id, day_start, day_end).await?;
        let monthly_used = self.store.sum_costs(tenant_id, month_start, month_end).await?;

        let daily =
            evaluate(daily_used, estimated_cost, budget.daily_limit, budget.warning_threshold);
        let monthly =
            evaluate(monthly_used, estimated_cost, budget.monthly_limit, budget.warning_threshold);

        let status = BudgetStatus {
            tenant_id: tenant_id.to_string(),
            estimated_cost,
            daily_used,
            monthly_used,
            daily_limit: budget.daily_limit,
            monthly_limit: budget.monthly_limit,
            daily_remaining: daily.remaining,
            monthly_remaining: monthly.remaining,
            daily_warning: daily.warning,
            daily_exceeded: daily.exceeded,
            monthly_warning: monthly.warning,
            monthly_exceeded: monthly.exceeded,
            hard_limit: budget.hard_limit,
        };

        if status.is_exceeded() {
            metrics::record_budget_warning(tenant_id, true);
            tracing::warn!(
                tenant = %tenant_id,
                daily_used = %daily_used,
                monthly_used = %monthly_used,
                estimated = %estimated_cost,
                hard_limit = budget.hard_limit,
                "Tenant budget exceeded"
            );
        } else if status.is_warning() {
            metrics::record_budget_warning(tenant_id, false);
            tracing::info!(
                tenant = %tenant_id,
                daily_used = %daily_used,
                monthly_used = %monthly_used,
                "Tenant budget nearing limit"
            );
        }

        Ok(status)
    }

    /// Like [`check_budget`](Self::check_budget), but fails when a hard
    /// limit would be exceeded.
    pub async fn check_budget_or_raise(
        &self,
        tenant_id: &str,
        estimated_cost: Decimal,
    ) -> GatewayResult<BudgetStatus> {
        let status = self.check_budget(tenant_id, estimated_cost).await?;
        if status.blocks() {
            return Err(GatewayError::BudgetExceeded {
                tenant_id: tenant_id.to_string(),
                status: Box::new(status),
            });
        }
        Ok(status)
    }

    /// Totals over `[from, to)`, for one tenant or all of them.
    pub async fn summary(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<CostSummary> {
        let records = self.store.costs_in_range(tenant_id, from, to).await?;
        let savings = self.store.savings_in_range(tenant_id, from, to).await?;

        let mut summary = CostSummary {
            records: records.len(),
            ..CostSummary::default()
        };
        for record in &records {
            summary.total_cost += record.amount;
            if record.cache_hit {
                summary.cache_hits += 1;
            }
            *summary
                .by_provider
                .entry(record.provider_id.clone())
                .or_default() += record.amount;
            *summary.by_check_type.entry(record.check_type).or_default() += record.amount;
        }
        summary.total_saved = savings.iter().map(|s| s.amount_saved).sum();
        Ok(summary)
    }
}

impl std::fmt::Debug for CostLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostLedger")
            .field("budgets", &self.budgets.len())
            .field("estimates", &self.estimates)
            .finish_non_exhaustive()
    }
}

struct WindowCheck {
    remaining: Option<Decimal>,
    warning: bool,
    exceeded: bool,
}

fn evaluate(
    used: Decimal,
    estimated: Decimal,
    limit: Option<Decimal>,
    threshold: Decimal,
) -> WindowCheck {
    match limit {
        None => WindowCheck {
            remaining: None,
            warning: false,
            exceeded: false,
        },
        Some(limit) => {
            let projected = used + estimated;
            WindowCheck {
                remaining: Some((limit - used).max(Decimal::ZERO)),
                warning: projected >= threshold * limit,
                exceeded: projected > limit,
            }
        }
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of(now.date_naive());
    (start, start + ChronoDuration::days(1))
}

fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (start_of(first), start_of(next))
}
