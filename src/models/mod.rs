use crate::error::BacktestError;
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance for target weights summing to 1
pub const WEIGHT_TOLERANCE: f64 = 1e-8;

/// Portfolio returns closer to zero than this are treated as holidays
pub const ZERO_RETURN_TOLERANCE: f64 = 1e-8;

/// Trading days per year used for annualization
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Default starting capital
pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;

/// Open bag of strategy-specific parameters
pub type StrategyParams = HashMap<String, serde_json::Value>;

/// A named, date-indexed series of values
///
/// Dates are kept sorted ascending and unique. This is the shape every
/// derived output (wealth index, returns, totals) is handed to consumers in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl DateSeries {
    /// Build a series from (date, value) pairs, sorting by date
    ///
    /// If a date appears twice the later pair wins.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let mut pairs: Vec<(NaiveDate, f64)> = pairs.into_iter().collect();
        pairs.sort_by_key(|(date, _)| *date);

        let mut dates: Vec<NaiveDate> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (date, value) in pairs {
            if dates.last() == Some(&date) {
                if let Some(last) = values.last_mut() {
                    *last = value;
                }
                continue;
            }
            dates.push(date);
            values.push(value);
        }

        Self {
            name: name.into(),
            dates,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value recorded for `date`, if any
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Keep only the points matching `keep`
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(NaiveDate, f64) -> bool,
    {
        let (dates, values) = self.iter().filter(|&(d, v)| keep(d, v)).unzip();
        Self {
            name: self.name.clone(),
            dates,
            values,
        }
    }

    /// Apply `f` to every value, keeping the dates
    pub fn map<F>(&self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            name: name.into(),
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Pairs of (self, other) values on dates present in both series
    ///
    /// Dates where either side is NaN are dropped.
    pub fn inner_join(&self, other: &DateSeries) -> Vec<(f64, f64)> {
        let mut joined = Vec::with_capacity(self.len().min(other.len()));
        let (mut i, mut j) = (0, 0);

        while i < self.dates.len() && j < other.dates.len() {
            match self.dates[i].cmp(&other.dates[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let (a, b) = (self.values[i], other.values[j]);
                    if !a.is_nan() && !b.is_nan() {
                        joined.push((a, b));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        joined
    }
}

/// Check a target weight vector against the instrument count and the sum rule
pub fn validate_weights(weights: &[f64], instruments: usize) -> Result<()> {
    if weights.len() != instruments {
        return Err(BacktestError::WeightCount {
            weights: weights.len(),
            instruments,
        });
    }

    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(BacktestError::WeightSum {
            sum,
            tolerance: WEIGHT_TOLERANCE,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_from_pairs_sorts_and_dedups() {
        let series = DateSeries::from_pairs("s", vec![(d(3), 3.0), (d(1), 1.0), (d(3), 4.0)]);

        assert_eq!(series.dates, vec![d(1), d(3)]);
        assert_eq!(series.values, vec![1.0, 4.0]);
        assert_eq!(series.get(d(3)), Some(4.0));
        assert_eq!(series.get(d(2)), None);
    }

    #[test]
    fn test_inner_join_drops_unmatched_and_nan() {
        let a = DateSeries::from_pairs(
            "a",
            vec![(d(1), 0.1), (d(2), f64::NAN), (d(3), 0.3), (d(5), 0.5)],
        );
        let b = DateSeries::from_pairs(
            "b",
            vec![(d(2), 0.2), (d(3), 0.03), (d(4), 0.04), (d(5), 0.05)],
        );

        let joined = a.inner_join(&b);
        assert_eq!(joined, vec![(0.3, 0.03), (0.5, 0.05)]);
    }

    #[test]
    fn test_validate_weights() {
        assert!(validate_weights(&[0.5, 0.5], 2).is_ok());
        assert!(validate_weights(&[0.3, 0.3, 0.4], 3).is_ok());

        let err = validate_weights(&[0.5, 0.4], 2).unwrap_err();
        assert!(matches!(err, BacktestError::WeightSum { .. }));

        let err = validate_weights(&[1.0], 2).unwrap_err();
        assert!(matches!(err, BacktestError::WeightCount { weights: 1, instruments: 2 }));

        // Within tolerance
        assert!(validate_weights(&[0.5, 0.5 + 1e-10], 2).is_ok());
        assert!(validate_weights(&[f64::NAN, 1.0], 2).is_err());
    }
}
