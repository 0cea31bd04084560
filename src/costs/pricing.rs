//! Estimated cost per check type.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::CostConfig;
use crate::providers::types::CheckType;

/// Lookup table of estimated costs, built from [`CostConfig`].
///
/// Used for cache-savings amounts and pre-flight budget checks. Actual
/// spend always comes from the provider's reported cost.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimates {
    currency: String,
    default_estimate: Decimal,
    estimates: HashMap<CheckType, Decimal>,
}

impl CostEstimates {
    pub fn from_config(config: &CostConfig) -> Self {
        let mut estimates = HashMap::new();
        for (name, amount) in &config.estimates {
            match name.parse::<CheckType>() {
                Ok(check_type) => {
                    estimates.insert(check_type, *amount);
                }
                Err(_) => {
                    tracing::warn!(
                        check_type = %name,
                        "Ignoring cost estimate for unknown check type"
                    );
                }
            }
        }

        Self {
            currency: config.currency.clone(),
            default_estimate: config.default_estimate,
            estimates,
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn estimate(&self, check_type: CheckType) -> Decimal {
        self.estimates
            .get(&check_type)
            .copied()
            .unwrap_or(self.default_estimate)
    }
}

impl Default for CostEstimates {
    fn default() -> Self {
        Self::from_config(&CostConfig::default())
    }
}
