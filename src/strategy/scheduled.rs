use super::{RebalanceContext, WeightingStrategy};
use crate::error::BacktestError;
use crate::models::{validate_weights, StrategyParams};
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weights that take effect from a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    pub weights: Vec<f64>,
}

/// Time-varying target weights
///
/// On each rebalance date the latest entry dated on or before that date
/// applies. Before the first entry the construction weights are used.
///
/// Parameter form (`schedule` key):
/// ```json
/// {"schedule": [{"date": "2021-01-01", "weights": [0.8, 0.2]},
///               {"date": "2022-01-01", "weights": [0.4, 0.6]}]}
/// ```
#[derive(Debug, Clone)]
pub struct ScheduledWeights {
    entries: Vec<ScheduleEntry>,
}

impl ScheduledWeights {
    /// Build from entries; they are sorted by date
    pub fn new(mut entries: Vec<ScheduleEntry>) -> Self {
        entries.sort_by_key(|e| e.date);
        Self { entries }
    }

    /// Parse the `schedule` parameter and check every entry's weights
    pub fn from_params(params: &StrategyParams, instruments: usize) -> Result<Self> {
        let raw = params
            .get("schedule")
            .ok_or_else(|| BacktestError::invalid_parameter("schedule", "missing"))?;

        let entries: Vec<ScheduleEntry> = serde_json::from_value(raw.clone())
            .map_err(|e| BacktestError::invalid_parameter("schedule", e.to_string()))?;

        for entry in &entries {
            validate_weights(&entry.weights, instruments)?;
        }

        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    fn active_entry(&self, date: NaiveDate) -> Option<&ScheduleEntry> {
        let idx = self.entries.partition_point(|e| e.date <= date);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }
}

impl WeightingStrategy for ScheduledWeights {
    fn target_weights(&self, ctx: &RebalanceContext<'_>) -> Result<Vec<f64>> {
        let weights = match self.active_entry(ctx.date) {
            Some(entry) => {
                tracing::debug!("Using scheduled weights from {} on {}", entry.date, ctx.date);
                entry.weights.clone()
            }
            None => ctx.base_weights.to_vec(),
        };
        Ok(weights)
    }

    fn name(&self) -> &str {
        "ScheduledWeights"
    }

    fn short_name(&self) -> &str {
        "Scheduled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::portfolio::PortfolioState;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weights_on(strategy: &ScheduledWeights, date: NaiveDate) -> Vec<f64> {
        let instruments = vec!["A".to_string(), "B".to_string()];
        let state = PortfolioState::new(1.0, 2);
        let params = StrategyParams::new();
        let ctx = RebalanceContext {
            date,
            state: &state,
            instruments: &instruments,
            base_weights: &[0.5, 0.5],
            params: &params,
        };
        strategy.target_weights(&ctx).unwrap()
    }

    #[test]
    fn test_latest_entry_applies() {
        let strategy = ScheduledWeights::new(vec![
            ScheduleEntry {
                date: ymd(2022, 1, 1),
                weights: vec![0.4, 0.6],
            },
            ScheduleEntry {
                date: ymd(2021, 1, 1),
                weights: vec![0.8, 0.2],
            },
        ]);

        assert_eq!(weights_on(&strategy, ymd(2020, 6, 30)), vec![0.5, 0.5]);
        assert_eq!(weights_on(&strategy, ymd(2021, 1, 1)), vec![0.8, 0.2]);
        assert_eq!(weights_on(&strategy, ymd(2021, 12, 31)), vec![0.8, 0.2]);
        assert_eq!(weights_on(&strategy, ymd(2023, 3, 31)), vec![0.4, 0.6]);
    }

    #[test]
    fn test_from_params() {
        let mut params = StrategyParams::new();
        params.insert(
            "schedule".to_string(),
            json!([{"date": "2021-01-01", "weights": [0.8, 0.2]}]),
        );

        let strategy = ScheduledWeights::from_params(&params, 2).unwrap();
        assert_eq!(strategy.entries().len(), 1);
        assert_eq!(strategy.entries()[0].date, ymd(2021, 1, 1));
    }

    #[test]
    fn test_from_params_rejects_bad_entries() {
        let mut params = StrategyParams::new();
        params.insert("schedule".to_string(), json!("not a list"));
        assert!(matches!(
            ScheduledWeights::from_params(&params, 2),
            Err(BacktestError::InvalidParameter { .. })
        ));

        params.insert(
            "schedule".to_string(),
            json!([{"date": "2021-01-01", "weights": [0.8, 0.3]}]),
        );
        assert!(matches!(
            ScheduledWeights::from_params(&params, 2),
            Err(BacktestError::WeightSum { .. })
        ));
    }
}
