use crate::backtest::{BacktestResult, PerformanceMetrics};
use crate::models::DateSeries;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serializable summary of a run and its statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_value: f64,
    pub benchmark: Option<String>,
    pub rebalance_dates: Vec<NaiveDate>,
    /// (series name, statistics), portfolio first
    pub metrics: Vec<(String, PerformanceMetrics)>,
    pub wealth_index: DateSeries,
    pub weights: Vec<DateSeries>,
}

impl RunReport {
    pub fn new(
        result: &BacktestResult,
        benchmark: Option<&str>,
        metrics: Vec<(String, PerformanceMetrics)>,
    ) -> Self {
        Self {
            name: result.name.clone(),
            start_date: result.start_date,
            end_date: result.end_date,
            initial_capital: result.initial_capital,
            final_value: result.final_value(),
            benchmark: benchmark.map(str::to_string),
            rebalance_dates: result.rebalance_dates.clone(),
            metrics,
            wealth_index: result.derived.wealth_index.clone(),
            weights: result.derived.weights.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON export to `path`
    pub fn save_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        tracing::info!("Saved report to {}", path.display());
        Ok(())
    }

    /// Boxed plain-text report
    pub fn render(&self) -> String {
        let mut lines = vec![
            String::new(),
            "╔═══════════════════════════════════════════════════════╗".to_string(),
            "║             REBALANCING PERFORMANCE REPORT            ║".to_string(),
            "╚═══════════════════════════════════════════════════════╝".to_string(),
            String::new(),
            "📊 RUN SUMMARY".to_string(),
            format!("  Strategy:              {}", self.name),
            format!("  Period:                {} - {}", self.start_date, self.end_date),
            format!("  Initial Portfolio:     ${:.2}", self.initial_capital),
            format!("  Final Portfolio:       ${:.2}", self.final_value),
            format!("  Rebalances:            {}", self.rebalance_dates.len()),
        ];
        if let Some(benchmark) = &self.benchmark {
            lines.push(format!("  Benchmark:             {}", benchmark));
        }

        for (name, metrics) in &self.metrics {
            lines.push(String::new());
            lines.push(format!("📈 {}", name));
            for (label, value) in metrics.entries() {
                let heading = format!("{}:", label);
                lines.push(format!("  {:<22} {}", heading, format_metric(label, value)));
            }
        }

        lines.push(String::new());
        lines.push("═══════════════════════════════════════════════════════".to_string());
        lines.push(String::new());
        lines.join("\n") + "\n"
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

/// Percent for return-like statistics, plain ratio otherwise
fn format_metric(label: &str, value: f64) -> String {
    if value.is_nan() {
        return "n/a".to_string();
    }
    match label {
        "Sharpe" | "Beta" | "Up Capture" | "Down Capture" => format!("{:.2}", value),
        _ => format!("{:+.2}%", value * 100.0),
    }
}
