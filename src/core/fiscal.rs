use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Month in which a fiscal year starts (April).
const FIRST_MONTH: u32 = 4;

/// Fiscal year key under which a rule set is published.
///
/// Standard keys have the form "2024-25" (1 April 2024 to 31 March 2025), but any
/// non-empty string is a valid key so that test or provisional rule sets ("T1")
/// can be addressed the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FiscalYear(String);

impl FiscalYear {
    pub fn new(key: impl Into<String>) -> Self {
        FiscalYear(key.into())
    }

    /// The fiscal year a date falls in
    pub fn containing(date: NaiveDate) -> Self {
        let start = if date.month() >= FIRST_MONTH {
            date.year()
        } else {
            date.year() - 1
        };
        FiscalYear(format!("{}-{:02}", start, (start + 1).rem_euclid(100)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar year in which the fiscal year starts, if the key is of the
    /// "YYYY-YY" form and the two halves are consecutive years.
    pub fn start_year(&self) -> Option<i32> {
        let (start, end) = self.0.split_once('-')?;
        if start.len() != 4 || end.len() != 2 {
            return None;
        }
        let start: i32 = start.parse().ok()?;
        let end: i32 = end.parse().ok()?;
        ((start + 1).rem_euclid(100) == end).then_some(start)
    }

    /// 1 April of the starting year
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year()?, FIRST_MONTH, 1)
    }

    /// 31 March of the following year
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year()? + 1, FIRST_MONTH - 1, 31)
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FiscalYear {
    fn from(key: &str) -> Self {
        FiscalYear::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn containing_date_before_april() {
        // 31 March 2025 is the last day of 2024-25
        assert_eq!(FiscalYear::containing(date(2025, 3, 31)).as_str(), "2024-25");
    }

    #[test]
    fn containing_date_on_april_first() {
        assert_eq!(FiscalYear::containing(date(2025, 4, 1)).as_str(), "2025-26");
    }

    #[test]
    fn containing_date_in_december() {
        assert_eq!(FiscalYear::containing(date(2024, 12, 31)).as_str(), "2024-25");
    }

    #[test]
    fn century_rollover() {
        assert_eq!(FiscalYear::containing(date(2099, 6, 1)).as_str(), "2099-00");
        assert_eq!(FiscalYear::from("2099-00").start_year(), Some(2099));
    }

    #[test]
    fn start_and_end_dates() {
        let fy = FiscalYear::from("2024-25");
        assert_eq!(fy.start_date(), Some(date(2024, 4, 1)));
        assert_eq!(fy.end_date(), Some(date(2025, 3, 31)));
    }

    #[test]
    fn arbitrary_keys_have_no_dates() {
        assert_eq!(FiscalYear::from("T1").start_date(), None);
        assert_eq!(FiscalYear::from("2024-26").start_year(), None);
        assert_eq!(FiscalYear::from("24-25").start_year(), None);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&FiscalYear::from("2025-26")).unwrap();
        assert_eq!(json, "\"2025-26\"");
    }
}
