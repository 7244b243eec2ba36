use crate::backtest::{BacktestParams, Backtester, RebalanceFrequency};
use crate::data::{DataStore, ReturnSeriesProvider};
use crate::error::BacktestError;
use crate::models::{StrategyParams, DEFAULT_INITIAL_CAPITAL};
use crate::strategy::{build_strategy, StrategyKind};
use crate::Result;
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `REBALANCER_INITIAL_CAPITAL`
pub const ENV_PREFIX: &str = "REBALANCER";

/// Run settings, layered from defaults, an optional TOML file and the
/// environment (later layers win)
///
/// ```toml
/// tickers = ["SPY", "AGG"]
/// weights = [0.6, 0.4]
/// start_date = "2020-01-01"
/// end_date = "2023-12-31"
/// rebalance_freq = "QE"
/// benchmark = "SPY"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Empty means equal weights
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_frequency")]
    pub rebalance_freq: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub params: StrategyParams,
    #[serde(default)]
    pub benchmark: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Dataset name inside `data_dir`
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
}

fn default_capital() -> f64 {
    DEFAULT_INITIAL_CAPITAL
}

fn default_frequency() -> String {
    RebalanceFrequency::default().alias().to_string()
}

fn default_strategy() -> String {
    StrategyKind::default().to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_max_age() -> u64 {
    86_400
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            weights: Vec::new(),
            start_date: None,
            end_date: None,
            initial_capital: default_capital(),
            rebalance_freq: default_frequency(),
            strategy: default_strategy(),
            params: StrategyParams::new(),
            benchmark: None,
            data_dir: default_data_dir(),
            dataset: None,
            cache_max_age_secs: default_cache_max_age(),
        }
    }
}

impl BacktestConfig {
    /// Load settings from `path` (if given) and `REBALANCER_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings with an explicit environment source
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("initial_capital", DEFAULT_INITIAL_CAPITAL)?
            .set_default("rebalance_freq", default_frequency())?
            .set_default("strategy", default_strategy())?;

        if let Some(path) = path {
            tracing::debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tickers")
                    .with_list_parse_key("weights"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn frequency(&self) -> Result<RebalanceFrequency> {
        self.rebalance_freq.parse()
    }

    pub fn strategy_kind(&self) -> Result<StrategyKind> {
        self.strategy.parse()
    }

    /// Configured weights, or `1/n` each when none are given
    pub fn resolved_weights(&self) -> Vec<f64> {
        if self.weights.is_empty() && !self.tickers.is_empty() {
            vec![1.0 / self.tickers.len() as f64; self.tickers.len()]
        } else {
            self.weights.clone()
        }
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn data_store(&self) -> DataStore {
        DataStore::new(&self.data_dir).with_max_age(self.cache_max_age())
    }

    /// Engine parameters for this run
    pub fn to_params(&self) -> Result<BacktestParams> {
        let start_date = self
            .start_date
            .ok_or(BacktestError::MissingSetting("start_date"))?;
        let end_date = self
            .end_date
            .ok_or(BacktestError::MissingSetting("end_date"))?;
        if self.tickers.is_empty() {
            return Err(BacktestError::MissingSetting("tickers"));
        }

        Ok(
            BacktestParams::new(self.tickers.clone(), self.resolved_weights(), start_date, end_date)
                .with_capital(self.initial_capital)
                .with_frequency(self.frequency()?)
                .with_params(self.params.clone()),
        )
    }

    /// Validated backtester running the configured strategy over `provider`
    pub fn build_backtester(&self, provider: &dyn ReturnSeriesProvider) -> Result<Backtester> {
        let params = self.to_params()?;
        let strategy = build_strategy(self.strategy_kind()?, &params.weights, &params.params)?;
        Ok(Backtester::new(provider, params)?.with_strategy(strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let config = BacktestConfig::load_with_env(None, no_env()).unwrap();
        assert_eq!(config.initial_capital, 1_000_000.0);
        assert_eq!(config.frequency().unwrap(), RebalanceFrequency::QuarterEnd);
        assert_eq!(config.strategy_kind().unwrap(), StrategyKind::Static);
        assert_eq!(config.cache_max_age(), Duration::from_secs(86_400));
        assert!(config.tickers.is_empty());
    }

    #[test]
    fn test_load_toml_file() {
        let file = toml_file(
            r#"
tickers = ["SPY", "AGG"]
weights = [0.6, 0.4]
start_date = "2020-01-01"
end_date = "2020-12-31"
rebalance_freq = "ME"
benchmark = "SPY"
"#,
        );

        let config = BacktestConfig::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.tickers, vec!["SPY", "AGG"]);
        assert_eq!(config.weights, vec![0.6, 0.4]);
        assert_eq!(config.benchmark.as_deref(), Some("SPY"));

        let params = config.to_params().unwrap();
        assert_eq!(params.rebalance_freq, RebalanceFrequency::MonthEnd);
        assert_eq!(params.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("initial_capital = 5000.0\nrebalance_freq = \"YE\"\n");

        let mut vars = HashMap::new();
        vars.insert("REBALANCER_INITIAL_CAPITAL".to_string(), "250000".to_string());
        vars.insert("REBALANCER_TICKERS".to_string(), "SPY,AGG,GLD".to_string());
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(vars));

        let config = BacktestConfig::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.initial_capital, 250_000.0);
        assert_eq!(config.rebalance_freq, "YE");
        assert_eq!(config.tickers, vec!["SPY", "AGG", "GLD"]);
    }

    #[test]
    fn test_empty_weights_resolve_to_equal() {
        let config = BacktestConfig {
            tickers: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            ..Default::default()
        };
        assert_eq!(config.resolved_weights(), vec![0.25; 4]);
    }

    #[test]
    fn test_missing_dates_rejected() {
        let config = BacktestConfig {
            tickers: vec!["SPY".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.to_params(),
            Err(BacktestError::MissingSetting("start_date"))
        ));
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        let config = BacktestConfig {
            tickers: vec!["SPY".into()],
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2020, 2, 1),
            rebalance_freq: "fortnightly".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.to_params(),
            Err(BacktestError::UnknownFrequency(_))
        ));
    }
}
