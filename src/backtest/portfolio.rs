use crate::data::ReturnTable;
use crate::models::validate_weights;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Monetary value held in each instrument, plus uninvested cash
///
/// `positions[i]` corresponds to the i-th simulated instrument. Cash only
/// exists before the first rebalance: afterwards the portfolio is fully
/// invested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: Vec<f64>,
}

impl PortfolioState {
    /// All capital in cash, nothing invested yet
    pub fn new(initial_capital: f64, instruments: usize) -> Self {
        Self {
            cash: initial_capital,
            positions: vec![0.0; instruments],
        }
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.positions.iter().sum::<f64>()
    }

    pub fn is_invested(&self) -> bool {
        self.cash == 0.0
    }

    /// Current fraction of total value held in each instrument
    pub fn weights(&self) -> Vec<f64> {
        let total = self.total_value();
        self.positions.iter().map(|v| v / total).collect()
    }

    /// Reset every position to its target share of the current total value
    ///
    /// Trades are implicit and free. Cash is swept into positions, so the
    /// total value is unchanged.
    pub fn rebalance(&self, target_weights: &[f64]) -> Result<Self> {
        validate_weights(target_weights, self.positions.len())?;

        let total = self.total_value();
        Ok(Self {
            cash: 0.0,
            positions: target_weights.iter().map(|w| w * total).collect(),
        })
    }

    /// Grow each position by its return for `date`
    ///
    /// `returns` must have one column per position, in the same order.
    /// Instruments without a return on `date` keep their value; cash does
    /// not accrue.
    pub fn accrue_returns(&self, date: NaiveDate, returns: &ReturnTable) -> Self {
        let positions = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, value)| match returns.get(date, i) {
                Some(r) => value * (1.0 + r),
                None => *value,
            })
            .collect();

        Self {
            cash: self.cash,
            positions,
        }
    }
}
