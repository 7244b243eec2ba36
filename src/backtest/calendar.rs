use crate::error::BacktestError;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often the portfolio is restored to its target weights
///
/// Anchors follow the usual calendar aliases: weekly on Sundays, month,
/// quarter and year on their first or last calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RebalanceFrequency {
    /// Every calendar day
    #[serde(rename = "D")]
    Daily,
    /// Every Sunday
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "MS")]
    MonthStart,
    #[serde(rename = "ME")]
    MonthEnd,
    #[serde(rename = "QS")]
    QuarterStart,
    #[default]
    #[serde(rename = "QE")]
    QuarterEnd,
    #[serde(rename = "YS")]
    YearStart,
    #[serde(rename = "YE")]
    YearEnd,
}

impl RebalanceFrequency {
    pub const ALL: [RebalanceFrequency; 8] = [
        Self::YearEnd,
        Self::YearStart,
        Self::QuarterStart,
        Self::QuarterEnd,
        Self::MonthStart,
        Self::MonthEnd,
        Self::Weekly,
        Self::Daily,
    ];

    /// Short alias, e.g. `QE`
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Weekly => "W",
            Self::MonthStart => "MS",
            Self::MonthEnd => "ME",
            Self::QuarterStart => "QS",
            Self::QuarterEnd => "QE",
            Self::YearStart => "YS",
            Self::YearEnd => "YE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Daily => "Calendar day",
            Self::Weekly => "Weekly",
            Self::MonthStart => "Month start",
            Self::MonthEnd => "Month end",
            Self::QuarterStart => "Quarter start",
            Self::QuarterEnd => "Quarter end",
            Self::YearStart => "Year start",
            Self::YearEnd => "Year end",
        }
    }

    /// Whether `date` falls on this frequency's anchor
    pub fn is_anchor(&self, date: NaiveDate) -> bool {
        let quarter_month = |m: u32| m % 3 == 0;
        match self {
            Self::Daily => true,
            Self::Weekly => date.weekday() == Weekday::Sun,
            Self::MonthStart => date.day() == 1,
            Self::MonthEnd => is_month_end(date),
            Self::QuarterStart => date.day() == 1 && quarter_month(date.month() + 2),
            Self::QuarterEnd => is_month_end(date) && quarter_month(date.month()),
            Self::YearStart => date.month() == 1 && date.day() == 1,
            Self::YearEnd => date.month() == 12 && date.day() == 31,
        }
    }
}

fn is_month_end(date: NaiveDate) -> bool {
    date.checked_add_days(Days::new(1))
        .map(|next| next.day() == 1)
        .unwrap_or(true)
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.alias(), self.description())
    }
}

impl FromStr for RebalanceFrequency {
    type Err = BacktestError;

    /// Accepts the alias (`QE`), the alias with description (`QE - Quarter end`)
    /// or a spelled-out name (`quarterly-end`, `weekly`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alias = s.split(" - ").next().unwrap_or(s).trim().to_ascii_uppercase();
        let freq = match alias.as_str() {
            "D" | "DAILY" => Self::Daily,
            "W" | "WEEKLY" => Self::Weekly,
            "MS" | "MONTH-START" | "MONTHLY-START" => Self::MonthStart,
            "ME" | "M" | "MONTH-END" | "MONTHLY" => Self::MonthEnd,
            "QS" | "QUARTER-START" | "QUARTERLY-START" => Self::QuarterStart,
            "QE" | "Q" | "QUARTER-END" | "QUARTERLY" => Self::QuarterEnd,
            "YS" | "YEAR-START" | "YEARLY-START" => Self::YearStart,
            "YE" | "Y" | "YEAR-END" | "YEARLY" => Self::YearEnd,
            _ => return Err(BacktestError::UnknownFrequency(s.to_string())),
        };
        Ok(freq)
    }
}

/// Calendar axis the simulation walks
///
/// Every calendar day between `first` and `last` inclusive. Passed to the
/// backtester explicitly so tests can use a narrow axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            first: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN),
            last: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}

impl Calendar {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self { first, last }
    }

    /// Calendar days within `[start, end]`, ascending and gap-free
    pub fn dates_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let lo = start.max(self.first);
        let hi = end.min(self.last);
        if lo > hi {
            return Vec::new();
        }
        lo.iter_days().take_while(|d| *d <= hi).collect()
    }
}

/// Rebalance dates drawn from an ordered simulation range
///
/// Keeps the dates that fall on the frequency's anchor, minus the final date
/// of the range: there is no point rebalancing on the day the run ends.
pub fn rebalance_schedule(dates: &[NaiveDate], freq: RebalanceFrequency) -> Vec<NaiveDate> {
    let last = dates.last().copied();
    dates
        .iter()
        .copied()
        .filter(|d| freq.is_anchor(*d) && Some(*d) != last)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("QE".parse::<RebalanceFrequency>().unwrap(), RebalanceFrequency::QuarterEnd);
        assert_eq!("ms".parse::<RebalanceFrequency>().unwrap(), RebalanceFrequency::MonthStart);
        assert_eq!(
            "YE - Year end".parse::<RebalanceFrequency>().unwrap(),
            RebalanceFrequency::YearEnd
        );
        assert_eq!("weekly".parse::<RebalanceFrequency>().unwrap(), RebalanceFrequency::Weekly);
        assert!("fortnightly".parse::<RebalanceFrequency>().is_err());

        for freq in RebalanceFrequency::ALL {
            assert_eq!(freq.alias().parse::<RebalanceFrequency>().unwrap(), freq);
            assert_eq!(freq.to_string().parse::<RebalanceFrequency>().unwrap(), freq);
        }
    }

    #[test]
    fn test_default_is_quarter_end() {
        assert_eq!(RebalanceFrequency::default(), RebalanceFrequency::QuarterEnd);
    }

    #[test]
    fn test_dates_between_clips_to_calendar() {
        let calendar = Calendar::new(ymd(2024, 1, 1), ymd(2024, 1, 10));
        let dates = calendar.dates_between(ymd(2023, 12, 25), ymd(2024, 1, 3));
        assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 2), ymd(2024, 1, 3)]);

        assert!(calendar.dates_between(ymd(2024, 2, 1), ymd(2024, 2, 5)).is_empty());
        assert_eq!(Calendar::default().dates_between(ymd(2024, 2, 27), ymd(2024, 3, 1)).len(), 4);
    }

    #[test]
    fn test_quarter_end_schedule() {
        let dates = Calendar::default().dates_between(ymd(2023, 1, 1), ymd(2023, 12, 31));
        let schedule = rebalance_schedule(&dates, RebalanceFrequency::QuarterEnd);

        // Dec 31 is the final date, so it is dropped
        assert_eq!(schedule, vec![ymd(2023, 3, 31), ymd(2023, 6, 30), ymd(2023, 9, 30)]);
    }

    #[test]
    fn test_quarter_start_schedule() {
        let dates = Calendar::default().dates_between(ymd(2023, 1, 1), ymd(2023, 12, 31));
        let schedule = rebalance_schedule(&dates, RebalanceFrequency::QuarterStart);
        assert_eq!(
            schedule,
            vec![ymd(2023, 1, 1), ymd(2023, 4, 1), ymd(2023, 7, 1), ymd(2023, 10, 1)]
        );
    }

    #[test]
    fn test_weekly_schedule_is_sundays() {
        let dates = Calendar::default().dates_between(ymd(2024, 1, 1), ymd(2024, 1, 31));
        let schedule = rebalance_schedule(&dates, RebalanceFrequency::Weekly);

        assert_eq!(schedule.len(), 4); // Jan 7, 14, 21, 28
        assert!(schedule.iter().all(|d| d.weekday() == Weekday::Sun));
    }

    #[test]
    fn test_month_end_handles_leap_year() {
        let dates = Calendar::default().dates_between(ymd(2024, 1, 15), ymd(2024, 4, 15));
        let schedule = rebalance_schedule(&dates, RebalanceFrequency::MonthEnd);
        assert_eq!(schedule, vec![ymd(2024, 1, 31), ymd(2024, 2, 29), ymd(2024, 3, 31)]);
    }

    #[test]
    fn test_daily_schedule_excludes_end_date() {
        let dates = Calendar::default().dates_between(ymd(2024, 1, 1), ymd(2024, 1, 5));
        let schedule = rebalance_schedule(&dates, RebalanceFrequency::Daily);
        assert_eq!(schedule.len(), 4);
        assert!(!schedule.contains(&ymd(2024, 1, 5)));
    }

    #[test]
    fn test_year_anchors() {
        assert!(RebalanceFrequency::YearStart.is_anchor(ymd(2020, 1, 1)));
        assert!(!RebalanceFrequency::YearStart.is_anchor(ymd(2020, 2, 1)));
        assert!(RebalanceFrequency::YearEnd.is_anchor(ymd(2020, 12, 31)));
        assert!(!RebalanceFrequency::YearEnd.is_anchor(ymd(2020, 11, 30)));
    }
}
