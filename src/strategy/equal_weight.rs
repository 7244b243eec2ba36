use super::{RebalanceContext, WeightingStrategy};
use crate::error::BacktestError;
use crate::Result;

/// Equal-weight strategy: `1/n` in each of the n instruments
///
/// Ignores the construction weights.
#[derive(Debug, Clone, Default)]
pub struct EqualWeight;

impl EqualWeight {
    pub fn new() -> Self {
        Self
    }
}

impl WeightingStrategy for EqualWeight {
    fn target_weights(&self, ctx: &RebalanceContext<'_>) -> Result<Vec<f64>> {
        let n = ctx.instruments.len();
        if n == 0 {
            return Err(BacktestError::WeightCount {
                weights: 0,
                instruments: 0,
            });
        }
        Ok(vec![1.0 / n as f64; n])
    }

    fn name(&self) -> &str {
        "EqualWeight"
    }

    fn short_name(&self) -> &str {
        "EqualWt"
    }
}
