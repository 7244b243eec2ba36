// Target-weight policies
pub mod equal_weight;
pub mod scheduled;
pub mod static_weights;

use crate::backtest::portfolio::PortfolioState;
use crate::error::BacktestError;
use crate::models::StrategyParams;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use equal_weight::EqualWeight;
pub use scheduled::ScheduledWeights;
pub use static_weights::StaticWeights;

/// Everything a weighting strategy may look at on a rebalance date
#[derive(Debug, Clone, Copy)]
pub struct RebalanceContext<'a> {
    pub date: NaiveDate,
    /// Portfolio state after the day's returns, before rebalancing
    pub state: &'a PortfolioState,
    pub instruments: &'a [String],
    /// Weights supplied at construction
    pub base_weights: &'a [f64],
    pub params: &'a StrategyParams,
}

/// Base trait for all allocation policies
///
/// Called once at the start date and once per scheduled rebalance date,
/// never on accrual-only dates. The returned vector must have one weight per
/// instrument summing to 1; the backtester rejects anything else.
pub trait WeightingStrategy: Send + Sync {
    /// Target weights for the rebalance on `ctx.date`
    fn target_weights(&self, ctx: &RebalanceContext<'_>) -> Result<Vec<f64>>;

    /// Display name
    fn name(&self) -> &str;

    /// Short label used for return series
    fn short_name(&self) -> &str {
        self.name()
    }
}

/// Built-in strategies selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Static,
    Equal,
    Scheduled,
}

impl FromStr for StrategyKind {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "base" => Ok(Self::Static),
            "equal" | "equal-weight" => Ok(Self::Equal),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(BacktestError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Equal => "equal",
            Self::Scheduled => "scheduled",
        };
        f.write_str(name)
    }
}

/// Build a strategy from its kind, the base weights and the parameter bag
pub fn build_strategy(
    kind: StrategyKind,
    base_weights: &[f64],
    params: &StrategyParams,
) -> Result<Box<dyn WeightingStrategy>> {
    let strategy: Box<dyn WeightingStrategy> = match kind {
        StrategyKind::Static => Box::new(StaticWeights::new(base_weights.to_vec())),
        StrategyKind::Equal => Box::new(EqualWeight::new()),
        StrategyKind::Scheduled => {
            Box::new(ScheduledWeights::from_params(params, base_weights.len())?)
        }
    };
    Ok(strategy)
}
