// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Month/year context for resolving bare day-of-month numbers.
//!
//! Run filenames only carry a day of month. The caller names the month the
//! batch belongs to; nothing here falls back to the current date.

use crate::error::{CoreError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunPeriod {
    year: i32,
    month: u32,
}

impl RunPeriod {
    /// Create a period from a year and a 1-based month.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPeriod`] when the month is out of range or
    /// the year is outside chrono's supported range.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::InvalidPeriod(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Year of the period.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month of the period (1-12).
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Resolve a day of month against this period.
    ///
    /// Returns `None` when the day does not exist in the month (for example
    /// day 31 in April).
    pub fn resolve_day(&self, day: u8) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, u32::from(day))
    }
}

impl FromStr for RunPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for RunPeriod {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RunPeriod> for String {
    fn from(period: RunPeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for RunPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period() {
        let period: RunPeriod = "2024-12".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 12);
        assert_eq!(period.to_string(), "2024-12");
    }

    #[test]
    fn test_rejects_bad_periods() {
        for raw in ["2024", "2024-13", "2024-00", "24-12", "2024-1", "december"] {
            assert!(raw.parse::<RunPeriod>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_resolve_day() {
        let period = RunPeriod::new(2024, 2).unwrap();
        assert_eq!(
            period.resolve_day(29),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(period.resolve_day(30), None);
    }
}
