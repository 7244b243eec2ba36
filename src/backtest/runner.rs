use crate::backtest::calendar::{rebalance_schedule, Calendar, RebalanceFrequency};
use crate::backtest::history::{DerivedSeries, HistoryRow, PortfolioHistory};
use crate::backtest::portfolio::PortfolioState;
use crate::data::{ReturnSeriesProvider, ReturnTable};
use crate::error::BacktestError;
use crate::models::{validate_weights, StrategyParams, DEFAULT_INITIAL_CAPITAL};
use crate::strategy::{RebalanceContext, StaticWeights, WeightingStrategy};
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inputs that define a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub rebalance_freq: RebalanceFrequency,
    /// Extra parameters for non-default strategies
    pub params: StrategyParams,
    pub calendar: Calendar,
}

impl BacktestParams {
    /// Parameters with the default capital, quarter-end rebalancing and the
    /// default calendar axis
    pub fn new(
        tickers: Vec<String>,
        weights: Vec<f64>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            tickers,
            weights,
            start_date,
            end_date,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            rebalance_freq: RebalanceFrequency::default(),
            params: StrategyParams::new(),
            calendar: Calendar::default(),
        }
    }

    pub fn with_capital(mut self, initial_capital: f64) -> Self {
        self.initial_capital = initial_capital;
        self
    }

    pub fn with_frequency(mut self, rebalance_freq: RebalanceFrequency) -> Self {
        self.rebalance_freq = rebalance_freq;
        self
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }
}

/// Output of a completed backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub rebalance_dates: Vec<NaiveDate>,
    pub history: PortfolioHistory,
    pub derived: DerivedSeries,
    pub final_state: PortfolioState,
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        self.final_state.total_value()
    }

    pub fn total_return(&self) -> f64 {
        self.derived.wealth_index.last().map(|w| w - 1.0).unwrap_or(0.0)
    }
}

/// Periodic-rebalancing portfolio simulator
///
/// Walks the calendar one day at a time: each day's returns are applied to
/// the holdings, and on scheduled dates the holdings are reset to the
/// strategy's target weights. Dates are processed strictly in order since
/// every rebalance depends on the value left by the previous day.
pub struct Backtester {
    params: BacktestParams,
    returns: ReturnTable,
    strategy: Box<dyn WeightingStrategy>,
    strat_dates: Vec<NaiveDate>,
    rebalance_dates: Vec<NaiveDate>,
}

impl Backtester {
    /// Validate the inputs and precompute the date axis and schedule
    ///
    /// Uses the construction weights as a static policy; see
    /// [`Backtester::with_strategy`] to substitute another one.
    pub fn new(provider: &dyn ReturnSeriesProvider, params: BacktestParams) -> Result<Self> {
        provider.returns().validate()?;

        for ticker in &params.tickers {
            if !provider.tickers().contains(ticker) {
                return Err(BacktestError::UnknownInstrument(ticker.clone()));
            }
        }

        validate_weights(&params.weights, params.tickers.len())?;

        if !(params.initial_capital.is_finite() && params.initial_capital > 0.0) {
            return Err(BacktestError::InvalidCapital(params.initial_capital));
        }

        if params.start_date > params.end_date {
            return Err(BacktestError::InvertedDateRange {
                start: params.start_date,
                end: params.end_date,
            });
        }

        let strat_dates = params
            .calendar
            .dates_between(params.start_date, params.end_date);
        if strat_dates.is_empty() {
            return Err(BacktestError::EmptyDateRange {
                start: params.start_date,
                end: params.end_date,
            });
        }

        let rebalance_dates = rebalance_schedule(&strat_dates, params.rebalance_freq);
        let returns = provider.returns().select(&params.tickers)?;
        let strategy = Box::new(StaticWeights::new(params.weights.clone()));

        Ok(Self {
            params,
            returns,
            strategy,
            strat_dates,
            rebalance_dates,
        })
    }

    /// Replace the weighting policy
    pub fn with_strategy(mut self, strategy: Box<dyn WeightingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    pub fn strategy(&self) -> &dyn WeightingStrategy {
        self.strategy.as_ref()
    }

    /// Every simulated date, ascending and gap-free
    pub fn strat_dates(&self) -> &[NaiveDate] {
        &self.strat_dates
    }

    pub fn rebalance_dates(&self) -> &[NaiveDate] {
        &self.rebalance_dates
    }

    pub fn is_rebalance_date(&self, date: NaiveDate) -> bool {
        self.rebalance_dates.binary_search(&date).is_ok()
    }

    /// All capital in cash, before the first rebalance
    pub fn initial_state(&self) -> PortfolioState {
        PortfolioState::new(self.params.initial_capital, self.params.tickers.len())
    }

    /// Ask the strategy for `date`'s weights and reset the holdings to them
    pub fn rebalance(&self, state: &PortfolioState, date: NaiveDate) -> Result<PortfolioState> {
        let ctx = RebalanceContext {
            date,
            state,
            instruments: &self.params.tickers,
            base_weights: &self.params.weights,
            params: &self.params.params,
        };
        let target_weights = self.strategy.target_weights(&ctx)?;
        state.rebalance(&target_weights)
    }

    /// Apply `date`'s returns to the holdings
    pub fn accrue_returns(&self, state: &PortfolioState, date: NaiveDate) -> PortfolioState {
        state.accrue_returns(date, &self.returns)
    }

    /// Advance one date: accrue, then rebalance if scheduled
    ///
    /// Returns the new state together with the single history row for
    /// `date`.
    pub fn step(
        &self,
        state: PortfolioState,
        date: NaiveDate,
    ) -> Result<(PortfolioState, HistoryRow)> {
        let accrued = self.accrue_returns(&state, date);

        let next = if self.is_rebalance_date(date) {
            tracing::debug!(
                "Rebalancing on {} at portfolio value {:.2}",
                date,
                accrued.total_value()
            );
            self.rebalance(&accrued, date)?
        } else {
            accrued
        };

        let row = HistoryRow {
            date,
            values: next.positions.clone(),
        };
        Ok((next, row))
    }

    /// Run the simulation over the whole date range
    pub fn run(&self) -> Result<BacktestResult> {
        let (&first, rest) = self
            .strat_dates
            .split_first()
            .ok_or(BacktestError::EmptyDateRange {
                start: self.params.start_date,
                end: self.params.end_date,
            })?;

        tracing::info!(
            "Starting backtest {}: {} dates, {} rebalances, {} instruments",
            self,
            self.strat_dates.len(),
            self.rebalance_dates.len(),
            self.params.tickers.len()
        );

        let mut history =
            PortfolioHistory::with_capacity(self.params.tickers.clone(), self.strat_dates.len());

        // Invest the initial capital at the start date
        let invested = self.rebalance(&self.initial_state(), first)?;
        history.push(HistoryRow {
            date: first,
            values: invested.positions.clone(),
        })?;

        let final_state = rest.iter().try_fold(invested, |state, &date| {
            let (next, row) = self.step(state, date)?;
            history.push(row)?;
            Ok::<_, BacktestError>(next)
        })?;

        let derived = DerivedSeries::from_history(&history, self.strategy.short_name());

        let result = BacktestResult {
            name: self.strategy.short_name().to_string(),
            start_date: first,
            end_date: rest.last().copied().unwrap_or(first),
            initial_capital: self.params.initial_capital,
            rebalance_dates: self.rebalance_dates.clone(),
            history,
            derived,
            final_state,
        };

        tracing::info!(
            "Backtest complete: final value ${:.2} ({:+.2}%)",
            result.final_value(),
            result.total_return() * 100.0
        );

        Ok(result)
    }
}

impl std::fmt::Display for Backtester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} - {}",
            self.strategy.short_name(),
            self.params.start_date,
            self.params.end_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketData;
    use crate::strategy::EqualWeight;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn two_asset_data() -> MarketData {
        let mut returns = ReturnTable::new(tickers(&["A", "B"]));
        returns.insert_row(ymd(2024, 1, 2), vec![Some(0.10), Some(-0.10)]).unwrap();
        returns.insert_row(ymd(2024, 1, 3), vec![Some(0.05), None]).unwrap();
        returns.insert_row(ymd(2024, 1, 4), vec![Some(-0.02), Some(0.03)]).unwrap();
        MarketData::from_returns(returns)
    }

    #[test]
    fn test_backtest_rebalance_scenario() {
        tracing_subscriber::fmt()
            .with_env_filter("rebalancer=debug")
            .try_init()
            .ok();

        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.5, 0.5],
            ymd(2024, 1, 1),
            ymd(2024, 1, 4),
        )
        .with_frequency(RebalanceFrequency::Daily);
        let bt = Backtester::new(&data, params).unwrap();

        // Pre-rebalance values on Jan 2: 550k / 450k, total unchanged
        let start = bt.rebalance(&bt.initial_state(), ymd(2024, 1, 1)).unwrap();
        let accrued = bt.accrue_returns(&start, ymd(2024, 1, 2));
        assert!((accrued.positions[0] - 550_000.0).abs() < 1e-6);
        assert!((accrued.positions[1] - 450_000.0).abs() < 1e-6);
        assert!((accrued.total_value() - 1_000_000.0).abs() < 1e-6);

        let result = bt.run().unwrap();
        let jan2 = result.history.get(ymd(2024, 1, 2)).unwrap();
        assert!((jan2.values[0] - 500_000.0).abs() < 1e-6);
        assert!((jan2.values[1] - 500_000.0).abs() < 1e-6);

        // Jan 4 is the last date: accrued but not rebalanced
        assert_eq!(result.rebalance_dates.len(), 3);
        assert!(!bt.is_rebalance_date(ymd(2024, 1, 4)));
    }

    #[test]
    fn test_history_has_one_row_per_date() {
        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.3, 0.7],
            ymd(2023, 12, 20),
            ymd(2024, 1, 10),
        );
        let bt = Backtester::new(&data, params).unwrap();
        let result = bt.run().unwrap();

        assert_eq!(result.history.len(), 22);
        assert_eq!(result.history.dates(), bt.strat_dates().to_vec());
        assert!(result
            .history
            .dates()
            .windows(2)
            .all(|w| w[1] == w[0].succ_opt().unwrap()));
        assert_eq!(result.derived.wealth_index.first(), Some(1.0));
    }

    #[test]
    fn test_missing_return_leaves_value_unchanged() {
        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.5, 0.5],
            ymd(2024, 1, 1),
            ymd(2024, 1, 4),
        )
        .with_frequency(RebalanceFrequency::YearEnd);
        let result = Backtester::new(&data, params).unwrap().run().unwrap();

        let jan2 = result.history.get(ymd(2024, 1, 2)).unwrap();
        let jan3 = result.history.get(ymd(2024, 1, 3)).unwrap();
        assert_eq!(jan3.values[1], jan2.values[1]);
        assert!((jan3.values[0] - jan2.values[0] * 1.05).abs() < 1e-6);
    }

    #[test]
    fn test_construction_errors() {
        let data = two_asset_data();
        let base = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.5, 0.5],
            ymd(2024, 1, 1),
            ymd(2024, 1, 4),
        );

        let mut unknown = base.clone();
        unknown.tickers = tickers(&["A", "ZZZ"]);
        assert!(matches!(
            Backtester::new(&data, unknown),
            Err(BacktestError::UnknownInstrument(t)) if t == "ZZZ"
        ));

        let mut bad_weights = base.clone();
        bad_weights.weights = vec![0.5, 0.6];
        assert!(matches!(
            Backtester::new(&data, bad_weights),
            Err(BacktestError::WeightSum { .. })
        ));

        let bad_capital = base.clone().with_capital(0.0);
        assert!(matches!(
            Backtester::new(&data, bad_capital),
            Err(BacktestError::InvalidCapital(_))
        ));

        let mut inverted = base.clone();
        inverted.start_date = ymd(2024, 2, 1);
        assert!(matches!(
            Backtester::new(&data, inverted),
            Err(BacktestError::InvertedDateRange { .. })
        ));

        let outside = base
            .clone()
            .with_calendar(Calendar::new(ymd(2030, 1, 1), ymd(2030, 12, 31)));
        assert!(matches!(
            Backtester::new(&data, outside),
            Err(BacktestError::EmptyDateRange { .. })
        ));
    }

    #[test]
    fn test_result_dates_follow_clipped_calendar() {
        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.5, 0.5],
            ymd(2023, 12, 1),
            ymd(2024, 2, 1),
        )
        .with_calendar(Calendar::new(ymd(2024, 1, 1), ymd(2024, 1, 4)));
        let result = Backtester::new(&data, params).unwrap().run().unwrap();

        assert_eq!(result.start_date, ymd(2024, 1, 1));
        assert_eq!(result.end_date, ymd(2024, 1, 4));
        assert_eq!(result.history.len(), 4);
    }

    #[test]
    fn test_ragged_return_table_rejected() {
        let json = r#"{"returns":{"instruments":["SPY","JPM"],"rows":{"2024-03-01":[0.01]}}}"#;
        let data: MarketData = serde_json::from_str(json).unwrap();
        let params = BacktestParams::new(
            tickers(&["SPY", "JPM"]),
            vec![0.5, 0.5],
            ymd(2024, 3, 1),
            ymd(2024, 3, 5),
        );

        assert!(matches!(
            Backtester::new(&data, params),
            Err(BacktestError::RowWidth { expected: 2, actual: 1, .. })
        ));
    }

    struct BrokenStrategy;

    impl WeightingStrategy for BrokenStrategy {
        fn target_weights(&self, _ctx: &RebalanceContext<'_>) -> Result<Vec<f64>> {
            Ok(vec![0.9, 0.9])
        }

        fn name(&self) -> &str {
            "Broken"
        }
    }

    #[test]
    fn test_dynamic_weights_are_validated() {
        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.5, 0.5],
            ymd(2024, 1, 1),
            ymd(2024, 1, 4),
        );
        let bt = Backtester::new(&data, params)
            .unwrap()
            .with_strategy(Box::new(BrokenStrategy));

        assert!(matches!(bt.run(), Err(BacktestError::WeightSum { .. })));
    }

    #[test]
    fn test_custom_strategy_labels_returns() {
        let data = two_asset_data();
        let params = BacktestParams::new(
            tickers(&["A", "B"]),
            vec![0.9, 0.1],
            ymd(2024, 1, 1),
            ymd(2024, 1, 4),
        );
        let bt = Backtester::new(&data, params)
            .unwrap()
            .with_strategy(Box::new(EqualWeight::new()));
        assert_eq!(bt.to_string(), "EqualWt: 2024-01-01 - 2024-01-04");

        let result = bt.run().unwrap();
        assert_eq!(result.name, "EqualWt");
        assert_eq!(result.derived.portfolio_returns_all.name, "EqualWt");
        let first = &result.history.rows()[0];
        assert!((first.values[0] - 500_000.0).abs() < 1e-6);
    }
}
