//! Risk and return statistics over daily return series.
//!
//! Everything here is a pure function of its inputs. Two-series statistics
//! (beta, alpha, capture ratios) only use dates present in both series.

use crate::models::{DateSeries, TRADING_DAYS_PER_YEAR};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

/// Full set of performance statistics for one return series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(rename = "Total Return", deserialize_with = "nan_if_null")]
    pub total_return: f64,
    #[serde(rename = "CAGR", deserialize_with = "nan_if_null")]
    pub cagr: f64,
    #[serde(rename = "Volatility", deserialize_with = "nan_if_null")]
    pub volatility: f64,
    #[serde(rename = "Sharpe", deserialize_with = "nan_if_null")]
    pub sharpe: f64,
    #[serde(rename = "Max Drawdown", deserialize_with = "nan_if_null")]
    pub max_drawdown: f64,
    #[serde(rename = "Beta", deserialize_with = "nan_if_null")]
    pub beta: f64,
    #[serde(rename = "Alpha", deserialize_with = "nan_if_null")]
    pub alpha: f64,
    #[serde(rename = "Downside Deviation", deserialize_with = "nan_if_null")]
    pub downside_deviation: f64,
    #[serde(rename = "Up Capture", deserialize_with = "nan_if_null")]
    pub up_capture: f64,
    #[serde(rename = "Down Capture", deserialize_with = "nan_if_null")]
    pub down_capture: f64,
}

/// Undefined statistics are written as `null`; read them back as NaN
fn nan_if_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl PerformanceMetrics {
    /// (display name, value) pairs in report order
    pub fn entries(&self) -> [(&'static str, f64); 10] {
        [
            ("Total Return", self.total_return),
            ("CAGR", self.cagr),
            ("Volatility", self.volatility),
            ("Sharpe", self.sharpe),
            ("Max Drawdown", self.max_drawdown),
            ("Beta", self.beta),
            ("Alpha", self.alpha),
            ("Downside Deviation", self.downside_deviation),
            ("Up Capture", self.up_capture),
            ("Down Capture", self.down_capture),
        ]
    }
}

/// Calculate every statistic for `returns` against `bench_returns`
///
/// Assumes daily returns.
pub fn calculate_metrics(returns: &DateSeries, bench_returns: &DateSeries) -> PerformanceMetrics {
    let values = observed(&returns.values);

    let metrics = PerformanceMetrics {
        total_return: total_return(&values),
        cagr: cagr(&values),
        volatility: volatility(&values),
        sharpe: sharpe_ratio(&values),
        max_drawdown: max_drawdown(&values),
        beta: calculate_beta(returns, bench_returns),
        alpha: calculate_alpha(returns, bench_returns),
        downside_deviation: downside_deviation(&values),
        up_capture: upside_capture(returns, bench_returns),
        down_capture: downside_capture(returns, bench_returns),
    };

    if metrics.up_capture.is_nan() || metrics.down_capture.is_nan() {
        tracing::warn!(
            "Capture ratio undefined for {} against {}",
            returns.name,
            bench_returns.name
        );
    }

    metrics
}

/// Calculate metrics for many series against one benchmark in parallel
///
/// Results come back in input order, labelled with each series' name.
pub fn calculate_metrics_parallel(
    series: &[DateSeries],
    bench_returns: &DateSeries,
) -> Vec<(String, PerformanceMetrics)> {
    series
        .par_iter()
        .map(|s| (s.name.clone(), calculate_metrics(s, bench_returns)))
        .collect()
}

/// Compounded return over the whole series
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// Compound annual growth rate, assuming 252 observations per year
pub fn cagr(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    (1.0 + total_return(returns)).powf(TRADING_DAYS_PER_YEAR / returns.len() as f64) - 1.0
}

/// Annualized sample standard deviation
pub fn volatility(returns: &[f64]) -> f64 {
    sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sharpe ratio with a zero risk-free rate
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    mean(returns) / sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough decline of the wealth index, as a fraction <= 0
///
/// The wealth index is seeded with 1.0 so a loss on the first day counts.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;

    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        max_dd = max_dd.min(wealth / peak - 1.0);
    }

    max_dd
}

/// Annualized root-mean-square of returns below zero
pub fn downside_deviation(returns: &[f64]) -> f64 {
    let squared: Vec<f64> = returns
        .iter()
        .filter(|r| !r.is_nan())
        .map(|r| {
            let shortfall = (0.0 - r).max(0.0);
            shortfall * shortfall
        })
        .collect();
    mean(&squared).sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Covariance with the benchmark over the benchmark's variance
pub fn calculate_beta(returns: &DateSeries, bench_returns: &DateSeries) -> f64 {
    let joined = returns.inner_join(bench_returns);
    let (subject, bench): (Vec<f64>, Vec<f64>) = joined.into_iter().unzip();
    sample_cov(&subject, &bench) / sample_cov(&bench, &bench)
}

/// Annualized intercept of an OLS regression of returns on the benchmark
pub fn calculate_alpha(returns: &DateSeries, bench_returns: &DateSeries) -> f64 {
    let joined = returns.inner_join(bench_returns);
    let (subject, bench): (Vec<f64>, Vec<f64>) = joined.into_iter().unzip();

    let slope = sample_cov(&subject, &bench) / sample_cov(&bench, &bench);
    let intercept = mean(&subject) - slope * mean(&bench);
    intercept * TRADING_DAYS_PER_YEAR
}

/// Average return on up-benchmark days over the benchmark's average
pub fn upside_capture(returns: &DateSeries, bench_returns: &DateSeries) -> f64 {
    capture_ratio(returns, bench_returns, |b| b > 0.0)
}

/// Average return on down-benchmark days over the benchmark's average
pub fn downside_capture(returns: &DateSeries, bench_returns: &DateSeries) -> f64 {
    capture_ratio(returns, bench_returns, |b| b < 0.0)
}

fn capture_ratio<F>(returns: &DateSeries, bench_returns: &DateSeries, market: F) -> f64
where
    F: Fn(f64) -> bool,
{
    let (subject, bench): (Vec<f64>, Vec<f64>) = returns
        .inner_join(bench_returns)
        .into_iter()
        .filter(|&(_, b)| market(b))
        .unzip();

    let bench_avg = mean(&bench);
    if bench_avg == 0.0 || bench_avg.is_nan() {
        return f64::NAN;
    }
    mean(&subject) / bench_avg
}

fn observed(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); NaN below two observations
pub fn sample_std(values: &[f64]) -> f64 {
    sample_cov(values, values).sqrt()
}

/// Sample covariance (n - 1); NaN below two observations
pub fn sample_cov(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let (mean_a, mean_b) = (mean(&a[..n]), mean(&b[..n]));
    let sum: f64 = a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    sum / (n - 1) as f64
}
