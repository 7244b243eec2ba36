// Core modules
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod report;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{
    calculate_metrics, BacktestParams, BacktestResult, Backtester, PerformanceMetrics,
    RebalanceFrequency,
};
pub use data::{MarketData, ReturnSeriesProvider, ReturnTable};
pub use error::BacktestError;
pub use models::*;
pub use strategy::{StrategyKind, WeightingStrategy};

// Error handling
pub type Result<T> = std::result::Result<T, BacktestError>;
