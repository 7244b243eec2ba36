use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use rebalancer::backtest::{calculate_metrics_parallel, MarketScenario, SyntheticDataGenerator};
use rebalancer::config::BacktestConfig;
use rebalancer::data::{MarketData, ReturnSeriesProvider};
use rebalancer::report::RunReport;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    Uptrend,
    Downtrend,
    Sideways,
    Volatile,
    WithGaps,
    Drawdown,
}

impl From<Scenario> for MarketScenario {
    fn from(s: Scenario) -> Self {
        match s {
            Scenario::Uptrend => MarketScenario::Uptrend,
            Scenario::Downtrend => MarketScenario::Downtrend,
            Scenario::Sideways => MarketScenario::Sideways,
            Scenario::Volatile => MarketScenario::Volatile,
            Scenario::WithGaps => MarketScenario::WithGaps,
            Scenario::Drawdown => MarketScenario::DrawdownTest,
        }
    }
}

/// Simulate a periodically rebalanced portfolio and report its performance
#[derive(Debug, Parser)]
#[command(name = "backtest", version)]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding saved datasets
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Saved dataset name to load
    #[arg(long)]
    dataset: Option<String>,

    /// Generate synthetic prices instead of loading a dataset
    #[arg(long, value_enum)]
    synthetic: Option<Scenario>,

    /// Seed for synthetic prices
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Save the synthetic dataset under this name
    #[arg(long)]
    save_dataset: Option<String>,

    /// Comma-separated instruments
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,

    /// Comma-separated target weights, same order as tickers
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    end: Option<NaiveDate>,

    /// Rebalance frequency alias (D, W, MS, ME, QS, QE, YS, YE)
    #[arg(long)]
    freq: Option<String>,

    #[arg(long)]
    capital: Option<f64>,

    /// Benchmark instrument (defaults to the first ticker)
    #[arg(long)]
    benchmark: Option<String>,

    /// Weighting strategy (static, equal, scheduled)
    #[arg(long)]
    strategy: Option<String>,

    /// Write the report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut BacktestConfig) {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dataset) = self.dataset {
            config.dataset = Some(dataset);
        }
        if let Some(tickers) = self.tickers {
            config.tickers = tickers;
        }
        if let Some(weights) = self.weights {
            config.weights = weights;
        }
        if self.start.is_some() {
            config.start_date = self.start;
        }
        if self.end.is_some() {
            config.end_date = self.end;
        }
        if let Some(freq) = self.freq {
            config.rebalance_freq = freq;
        }
        if let Some(capital) = self.capital {
            config.initial_capital = capital;
        }
        if self.benchmark.is_some() {
            config.benchmark = self.benchmark;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rebalancer=info")),
        )
        .init();

    let args = Args::parse();
    let mut config =
        BacktestConfig::load(args.config.as_deref()).context("Failed to load settings")?;

    let synthetic = args.synthetic;
    let seed = args.seed;
    let save_as = args.save_dataset.clone();
    let json_path = args.json.clone();
    args.apply(&mut config);

    let data = match synthetic {
        Some(scenario) => synthetic_data(&mut config, scenario.into(), seed, save_as.as_deref())?,
        None => load_dataset(&config)?,
    };

    let backtester = config
        .build_backtester(&data)
        .context("Invalid backtest settings")?;
    let result = backtester.run().context("Backtest failed")?;

    let benchmark = config
        .benchmark
        .clone()
        .or_else(|| config.tickers.first().cloned())
        .context("No benchmark available")?;
    let bench_returns = data
        .returns()
        .series(&benchmark)
        .with_context(|| format!("Benchmark {} not in return data", benchmark))?;

    let mut series = vec![result.derived.port_returns.clone()];
    for ticker in &config.tickers {
        if let Some(s) = data.returns().series(ticker) {
            series.push(s.filter(|date, _| date >= result.start_date && date <= result.end_date));
        }
    }

    let metrics = calculate_metrics_parallel(&series, &bench_returns);
    let report = RunReport::new(&result, Some(&benchmark), metrics);
    report.print();

    if let Some(path) = json_path {
        report
            .save_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

fn synthetic_data(
    config: &mut BacktestConfig,
    scenario: MarketScenario,
    seed: u64,
    save_as: Option<&str>,
) -> Result<MarketData> {
    if config.tickers.is_empty() {
        config.tickers = vec!["SYNA".to_string(), "SYNB".to_string()];
    }
    let start = match config.start_date {
        Some(start) => start,
        None => NaiveDate::from_ymd_opt(2020, 1, 1).context("Invalid default start date")?,
    };
    let end = match config.end_date {
        Some(end) => end,
        None => NaiveDate::from_ymd_opt(2020, 12, 31).context("Invalid default end date")?,
    };
    config.start_date = Some(start);
    config.end_date = Some(end);

    // Returns start the day after the first price
    let first_price = start.pred_opt().unwrap_or(start);
    let num_days = (end - first_price).num_days() + 1;
    if num_days <= 0 {
        bail!("Start date {} is after end date {}", start, end);
    }

    tracing::info!(
        "Generating {:?} prices for {} tickers, seed {}",
        scenario,
        config.tickers.len(),
        seed
    );
    let mut generator = SyntheticDataGenerator::new(seed);
    let data = generator.generate(scenario, &config.tickers, first_price, num_days as usize);

    if let Some(name) = save_as {
        let path = config
            .data_store()
            .save(name, &data)
            .with_context(|| format!("Failed to save dataset {}", name))?;
        tracing::info!("Saved synthetic dataset to {}", path.display());
    }

    Ok(data)
}

fn load_dataset(config: &BacktestConfig) -> Result<MarketData> {
    let name = config
        .dataset
        .as_deref()
        .context("No data source: pass --dataset or --synthetic")?;
    let store = config.data_store();

    match store.load_fresh(name)? {
        Some(data) => Ok(data),
        // Stale data is still usable offline
        None => store.load(name).with_context(|| {
            format!(
                "Failed to load dataset {} from {}",
                name,
                store.dir().display()
            )
        }),
    }
}
