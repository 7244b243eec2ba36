use super::{RebalanceContext, WeightingStrategy};
use crate::Result;

/// Fixed-mix baseline strategy
///
/// Rebalances back to the same weights on every rebalance date. This is the
/// default policy: the weights handed to the backtester at construction.
///
/// Strategy:
/// - Invest the whole portfolio at the start date
/// - Restore the fixed mix on each scheduled date
/// - Never holds idle cash after a rebalance
#[derive(Debug, Clone)]
pub struct StaticWeights {
    weights: Vec<f64>,
}

impl StaticWeights {
    pub fn new(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl WeightingStrategy for StaticWeights {
    fn target_weights(&self, _ctx: &RebalanceContext<'_>) -> Result<Vec<f64>> {
        Ok(self.weights.clone())
    }

    fn name(&self) -> &str {
        "BaseStrategy"
    }

    fn short_name(&self) -> &str {
        "BaseStrat"
    }
}
