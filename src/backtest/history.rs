use crate::error::BacktestError;
use crate::models::{DateSeries, ZERO_RETURN_TOLERANCE};
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Holdings snapshot for one simulated date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    /// Value held in each instrument, in history column order
    pub values: Vec<f64>,
}

impl HistoryRow {
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Append-only, date-ordered record of portfolio holdings
///
/// Every date is written exactly once and dates strictly increase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistory {
    instruments: Vec<String>,
    rows: Vec<HistoryRow>,
}

impl PortfolioHistory {
    pub fn new(instruments: Vec<String>) -> Self {
        Self {
            instruments,
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(instruments: Vec<String>, capacity: usize) -> Self {
        Self {
            instruments,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append a row; its date must be after the last recorded date
    pub fn push(&mut self, row: HistoryRow) -> Result<()> {
        if let Some(last) = self.rows.last() {
            if row.date <= last.date {
                return Err(BacktestError::HistoryOrder {
                    date: row.date,
                    last: last.date,
                });
            }
        }
        if row.values.len() != self.instruments.len() {
            return Err(BacktestError::RowWidth {
                date: row.date,
                expected: self.instruments.len(),
                actual: row.values.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&HistoryRow> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Value held in one instrument over time
    pub fn column(&self, ticker: &str) -> Option<DateSeries> {
        let idx = self.instruments.iter().position(|t| t == ticker)?;
        Some(DateSeries {
            name: ticker.to_string(),
            dates: self.dates(),
            values: self.rows.iter().map(|r| r.values[idx]).collect(),
        })
    }

    /// Sum of holdings per date
    pub fn total_values(&self) -> DateSeries {
        DateSeries {
            name: "Total".to_string(),
            dates: self.dates(),
            values: self.rows.iter().map(HistoryRow::total).collect(),
        }
    }
}

/// Series computed once from a finished history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    pub total_port_values: DateSeries,
    /// One weight series (value / total) per instrument
    pub weights: Vec<DateSeries>,
    /// Growth of 1.0 invested at the first date
    pub wealth_index: DateSeries,
    pub cumulative_port_returns: DateSeries,
    /// Daily percentage change of total value; the first date has none
    pub portfolio_returns_all: DateSeries,
    /// `portfolio_returns_all` without near-zero days (holidays)
    pub port_returns: DateSeries,
}

impl DerivedSeries {
    /// Derive value, weight and return series from a portfolio history
    ///
    /// `name` labels the return series, usually the strategy's short name.
    pub fn from_history(history: &PortfolioHistory, name: &str) -> Self {
        let total_port_values = history.total_values();

        let weights = history
            .instruments()
            .iter()
            .enumerate()
            .map(|(i, ticker)| DateSeries {
                name: ticker.clone(),
                dates: total_port_values.dates.clone(),
                values: history
                    .rows()
                    .iter()
                    .zip(total_port_values.values.iter())
                    .map(|(row, total)| row.values[i] / total)
                    .collect(),
            })
            .collect();

        let wealth_index = match total_port_values.first() {
            Some(start) => total_port_values.map("Wealth Index", |v| v / start),
            None => DateSeries {
                name: "Wealth Index".to_string(),
                ..Default::default()
            },
        };

        let cumulative_port_returns = wealth_index.map("Cumulative Return", |w| w - 1.0);

        let pct_change = total_port_values
            .dates
            .iter()
            .skip(1)
            .zip(total_port_values.values.windows(2))
            .map(|(date, pair)| (*date, pair[1] / pair[0] - 1.0))
            .filter(|(_, r)| !r.is_nan());
        let portfolio_returns_all = DateSeries::from_pairs(name, pct_change);

        let port_returns =
            portfolio_returns_all.filter(|_, r| r.abs() >= ZERO_RETURN_TOLERANCE);

        Self {
            total_port_values,
            weights,
            wealth_index,
            cumulative_port_returns,
            portfolio_returns_all,
            port_returns,
        }
    }
}
