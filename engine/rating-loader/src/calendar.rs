//! # Calendar Windows
//!
//! Calendar-aligned aggregation spans. Window boundaries depend only on the
//! calendar and the [`WindowKind`], never on which dates carry data.

use crate::error::ConfigError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a calendar-aligned aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    /// Starts on the 1st of every month
    Monthly,
    /// Starts on Jan/Apr/Jul/Oct 1
    Quarterly,
    /// Starts on Jan/Jul 1
    HalfYearly,
    /// Starts on Jan 1
    Yearly,
    /// Starts on Jan 1 of years divisible by ten
    Decadal,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Monthly => "monthly",
            WindowKind::Quarterly => "quarterly",
            WindowKind::HalfYearly => "half-yearly",
            WindowKind::Yearly => "yearly",
            WindowKind::Decadal => "decadal",
        }
    }

    /// Number of months covered by one window
    pub fn months(&self) -> u32 {
        match self {
            WindowKind::Monthly => 1,
            WindowKind::Quarterly => 3,
            WindowKind::HalfYearly => 6,
            WindowKind::Yearly => 12,
            WindowKind::Decadal => 120,
        }
    }

    /// Canonical start of the window containing `date`
    pub fn window_start(&self, date: NaiveDate) -> NaiveDate {
        let year = date.year();
        let (year, month) = match self {
            WindowKind::Decadal => (year - year.rem_euclid(10), 1),
            WindowKind::Yearly => (year, 1),
            _ => {
                let span = self.months();
                (year, (date.month() - 1) / span * span + 1)
            }
        };
        first_of_month(year, month)
    }

    pub fn is_window_start(&self, date: NaiveDate) -> bool {
        self.window_start(date) == date
    }

    /// Start of the window following the one containing `date`
    pub fn next_start(&self, date: NaiveDate) -> NaiveDate {
        let start = self.window_start(date);
        let months = start.year() * 12 + start.month0() as i32 + self.months() as i32;
        first_of_month(months.div_euclid(12), months.rem_euclid(12) as u32 + 1)
    }

    /// Every window start whose window overlaps `[from, to]`
    pub fn starts_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let mut starts = Vec::new();
        if from > to {
            return starts;
        }

        let mut current = self.window_start(from);
        while current <= to {
            starts.push(current);
            current = self.next_start(current);
        }
        starts
    }
}

// Day 1 exists for every month chrono can represent.
fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(WindowKind::Monthly),
            "quarterly" | "quarter" => Ok(WindowKind::Quarterly),
            "half-yearly" | "halfyearly" | "half-year" => Ok(WindowKind::HalfYearly),
            "yearly" | "year" => Ok(WindowKind::Yearly),
            "decadal" | "decade" => Ok(WindowKind::Decadal),
            _ => Err(ConfigError::invalid("window kind", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_window_start_per_kind() {
        let date = d(1987, 8, 19);
        assert_eq!(WindowKind::Monthly.window_start(date), d(1987, 8, 1));
        assert_eq!(WindowKind::Quarterly.window_start(date), d(1987, 7, 1));
        assert_eq!(WindowKind::HalfYearly.window_start(date), d(1987, 7, 1));
        assert_eq!(WindowKind::Yearly.window_start(date), d(1987, 1, 1));
        assert_eq!(WindowKind::Decadal.window_start(date), d(1980, 1, 1));
        assert_eq!(WindowKind::Quarterly.window_start(d(2001, 3, 31)), d(2001, 1, 1));
    }

    #[test]
    fn test_next_start_crosses_year_end() {
        assert_eq!(WindowKind::Monthly.next_start(d(1999, 12, 25)), d(2000, 1, 1));
        assert_eq!(WindowKind::Quarterly.next_start(d(1999, 11, 2)), d(2000, 1, 1));
        assert_eq!(WindowKind::HalfYearly.next_start(d(1999, 2, 2)), d(1999, 7, 1));
        assert_eq!(WindowKind::Decadal.next_start(d(1994, 6, 6)), d(2000, 1, 1));
    }

    #[test]
    fn test_starts_between_are_aligned() {
        let starts = WindowKind::Quarterly.starts_between(d(2010, 2, 14), d(2011, 1, 1));
        assert_eq!(starts, vec![d(2010, 1, 1), d(2010, 4, 1), d(2010, 7, 1), d(2010, 10, 1), d(2011, 1, 1)]);
        for start in starts {
            assert!([1, 4, 7, 10].contains(&start.month()));
            assert_eq!(start.day(), 1);
        }
        assert!(WindowKind::Yearly.starts_between(d(2011, 1, 1), d(2010, 1, 1)).is_empty());
    }

    #[test]
    fn test_parse_window_kind() {
        assert_eq!("half-yearly".parse::<WindowKind>().unwrap(), WindowKind::HalfYearly);
        assert_eq!("Yearly".parse::<WindowKind>().unwrap(), WindowKind::Yearly);
        assert!("weekly".parse::<WindowKind>().is_err());
    }
}
