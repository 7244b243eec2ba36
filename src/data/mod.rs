// Return series provider
pub mod store;

use crate::error::BacktestError;
use crate::models::DateSeries;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use store::DataStore;

/// Per-instrument values keyed by calendar date
///
/// Each row holds one slot per instrument, in `instruments` order. A `None`
/// slot means the instrument has no observation on that date (non-trading
/// day for that instrument only).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatedTable {
    instruments: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

/// Daily fractional returns, e.g. `0.01` for +1%
pub type ReturnTable = DatedTable;

/// Daily close prices
pub type PriceTable = DatedTable;

impl DatedTable {
    pub fn new(instruments: Vec<String>) -> Self {
        Self {
            instruments,
            rows: BTreeMap::new(),
        }
    }

    /// Ordered instrument identifiers (the universe)
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.index_of(ticker).is_some()
    }

    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.instruments.iter().position(|t| t == ticker)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }

    /// Insert or replace the full row for `date`
    pub fn insert_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.instruments.len() {
            return Err(BacktestError::RowWidth {
                date,
                expected: self.instruments.len(),
                actual: values.len(),
            });
        }
        self.rows.insert(date, values);
        Ok(())
    }

    /// Check every row has one slot per instrument
    ///
    /// Tables built through `insert_row`/`set` always pass; this guards
    /// tables deserialized from disk.
    pub fn validate(&self) -> Result<()> {
        for (date, row) in &self.rows {
            if row.len() != self.instruments.len() {
                return Err(BacktestError::RowWidth {
                    date: *date,
                    expected: self.instruments.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }

    /// Set a single observation, creating an empty row for `date` if needed
    pub fn set(&mut self, date: NaiveDate, ticker: &str, value: f64) -> Result<()> {
        let idx = self
            .index_of(ticker)
            .ok_or_else(|| BacktestError::UnknownInstrument(ticker.to_string()))?;
        let width = self.instruments.len();
        let row = self.rows.entry(date).or_insert_with(|| vec![None; width]);
        let actual = row.len();
        let slot = row.get_mut(idx).ok_or(BacktestError::RowWidth {
            date,
            expected: width,
            actual,
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// Observation for instrument `idx` on `date`
    ///
    /// NaN observations are reported as missing.
    pub fn get(&self, date: NaiveDate, idx: usize) -> Option<f64> {
        self.rows
            .get(&date)
            .and_then(|row| row.get(idx).copied().flatten())
            .filter(|v| !v.is_nan())
    }

    pub fn row(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.rows.get(&date).map(|row| row.as_slice())
    }

    /// Observed values for one instrument, skipping missing dates
    pub fn series(&self, ticker: &str) -> Option<DateSeries> {
        let idx = self.index_of(ticker)?;
        let pairs = self
            .rows
            .iter()
            .filter_map(|(date, row)| {
                row.get(idx)
                    .copied()
                    .flatten()
                    .filter(|v| !v.is_nan())
                    .map(|v| (*date, v))
            });
        Some(DateSeries::from_pairs(ticker, pairs))
    }

    /// Table restricted to `tickers`, in the given order
    pub fn select(&self, tickers: &[String]) -> Result<Self> {
        let indices = tickers
            .iter()
            .map(|t| {
                self.index_of(t)
                    .ok_or_else(|| BacktestError::UnknownInstrument(t.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|(date, row)| {
                let values = indices
                    .iter()
                    .map(|&i| row.get(i).copied().flatten())
                    .collect();
                (*date, values)
            })
            .collect();

        Ok(Self {
            instruments: tickers.to_vec(),
            rows,
        })
    }

    /// Convert a price table into daily returns
    ///
    /// Prices are forward-filled per instrument, then the percentage change
    /// between consecutive rows is taken. The first row, and rows before an
    /// instrument's first price, have no return. Instruments are sorted
    /// alphabetically in the result.
    pub fn from_prices(prices: &PriceTable) -> ReturnTable {
        let mut order: Vec<usize> = (0..prices.instruments.len()).collect();
        order.sort_by(|&a, &b| prices.instruments[a].cmp(&prices.instruments[b]));

        let instruments = order.iter().map(|&i| prices.instruments[i].clone()).collect();
        let mut last_price: Vec<Option<f64>> = vec![None; order.len()];
        let mut rows = BTreeMap::new();

        for (date, row) in &prices.rows {
            let mut returns = Vec::with_capacity(order.len());
            for (slot, &col) in order.iter().enumerate() {
                let filled = row
                    .get(col)
                    .copied()
                    .flatten()
                    .filter(|p| !p.is_nan())
                    .or(last_price[slot]);
                let ret = match (last_price[slot], filled) {
                    (Some(prev), Some(curr)) if prev != 0.0 => Some(curr / prev - 1.0),
                    _ => None,
                };
                last_price[slot] = filled;
                returns.push(ret);
            }
            rows.insert(*date, returns);
        }

        ReturnTable { instruments, rows }
    }
}

/// Source of return (and optionally price) data for a backtest
pub trait ReturnSeriesProvider {
    fn returns(&self) -> &ReturnTable;

    fn prices(&self) -> Option<&PriceTable> {
        None
    }

    /// Instruments the provider knows about
    fn tickers(&self) -> &[String] {
        self.returns().instruments()
    }
}

/// In-memory market data: returns plus the prices they came from, if known
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketData {
    pub returns: ReturnTable,
    #[serde(default)]
    pub prices: Option<PriceTable>,
}

impl MarketData {
    pub fn from_returns(returns: ReturnTable) -> Self {
        Self {
            returns,
            prices: None,
        }
    }

    pub fn from_prices(prices: PriceTable) -> Self {
        let returns = ReturnTable::from_prices(&prices);
        Self {
            returns,
            prices: Some(prices),
        }
    }
}

impl ReturnSeriesProvider for MarketData {
    fn returns(&self) -> &ReturnTable {
        &self.returns
    }

    fn prices(&self) -> Option<&PriceTable> {
        self.prices.as_ref()
    }
}
