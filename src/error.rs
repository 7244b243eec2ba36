use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while configuring or running a backtest
///
/// Configuration errors abort a run before any portfolio state is touched.
/// Missing returns and degenerate statistics are not errors; they surface as
/// unchanged values or NaN in the output series.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Ticker {0} not in return data. Please check the input tickers.")]
    UnknownInstrument(String),

    #[error("Target weights sum to {sum}, expected 1 (tolerance {tolerance})")]
    WeightSum { sum: f64, tolerance: f64 },

    #[error("Got {weights} weights for {instruments} instruments")]
    WeightCount { weights: usize, instruments: usize },

    #[error("Initial capital must be positive, got {0}")]
    InvalidCapital(f64),

    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },

    #[error("No calendar dates between {start} and {end}")]
    EmptyDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Unknown rebalance frequency: {0}")]
    UnknownFrequency(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid strategy parameter '{key}': {message}")]
    InvalidParameter { key: String, message: String },

    #[error("Row for {date} has {actual} values, table has {expected} instruments")]
    RowWidth {
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },

    #[error("History row for {date} is not after the last recorded date {last}")]
    HistoryOrder { date: NaiveDate, last: NaiveDate },

    #[error("Data store error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl BacktestError {
    pub fn invalid_parameter(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            message: message.into(),
        }
    }
}
