pub mod calendar;
pub mod history;
pub mod metrics;
pub mod portfolio;
pub mod runner;
pub mod synthetic;

pub use calendar::{rebalance_schedule, Calendar, RebalanceFrequency};
pub use history::{DerivedSeries, HistoryRow, PortfolioHistory};
pub use metrics::{calculate_metrics, calculate_metrics_parallel, PerformanceMetrics};
pub use portfolio::PortfolioState;
pub use runner::{BacktestParams, BacktestResult, Backtester};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
