use crate::core::error::LoanError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar unit of a repayment or re-age frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
            FrequencyUnit::Months => "months",
        };
        f.write_str(label)
    }
}

/// Spacing between consecutive installments: `every` × `unit`.
///
/// Due dates are always computed from the anchor date rather than chained,
/// so month-end anchors do not drift (31 Jan, 28 Feb, 31 Mar, ...).
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use loan_replay::core::frequency::{Frequency, FrequencyUnit};
///
/// let every_30_days = Frequency::new(FrequencyUnit::Days, 30);
/// let start = NaiveDate::from_ymd_opt(2023, 4, 13).unwrap();
/// assert_eq!(
///     every_30_days.nth_date(start, 2).unwrap(),
///     NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frequency {
    pub unit: FrequencyUnit,
    pub every: u32,
}

impl Frequency {
    pub fn new(unit: FrequencyUnit, every: u32) -> Self {
        Self { unit, every }
    }

    pub fn monthly() -> Self {
        Self::new(FrequencyUnit::Months, 1)
    }

    /// The date `n` periods after `anchor` (`n = 0` is the anchor itself).
    pub fn nth_date(&self, anchor: NaiveDate, n: u32) -> Result<NaiveDate, LoanError> {
        let steps = u64::from(self.every) * u64::from(n);
        let date = match self.unit {
            FrequencyUnit::Days => anchor.checked_add_days(Days::new(steps)),
            FrequencyUnit::Weeks => anchor.checked_add_days(Days::new(steps * 7)),
            FrequencyUnit::Months => u32::try_from(steps)
                .ok()
                .and_then(|months| anchor.checked_add_months(Months::new(months))),
        };
        date.ok_or(LoanError::DateOutOfRange { anchor, periods: n })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.every, self.unit)
    }
}

/// `date` advanced by exactly one calendar month.
pub fn one_month_after(date: NaiveDate) -> Result<NaiveDate, LoanError> {
    Frequency::monthly().nth_date(date, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_dates() {
        let monthly = Frequency::monthly();
        assert_eq!(monthly.nth_date(date(2023, 1, 1), 0).unwrap(), date(2023, 1, 1));
        assert_eq!(monthly.nth_date(date(2023, 1, 1), 3).unwrap(), date(2023, 4, 1));
    }

    #[test]
    fn test_month_end_does_not_drift() {
        let monthly = Frequency::monthly();
        assert_eq!(monthly.nth_date(date(2023, 1, 31), 1).unwrap(), date(2023, 2, 28));
        assert_eq!(monthly.nth_date(date(2023, 1, 31), 2).unwrap(), date(2023, 3, 31));
    }

    #[test]
    fn test_days_and_weeks() {
        let fifteen_days = Frequency::new(FrequencyUnit::Days, 15);
        assert_eq!(fifteen_days.nth_date(date(2023, 1, 1), 1).unwrap(), date(2023, 1, 16));
        assert_eq!(fifteen_days.nth_date(date(2023, 1, 1), 3).unwrap(), date(2023, 2, 15));

        let biweekly = Frequency::new(FrequencyUnit::Weeks, 2);
        assert_eq!(biweekly.nth_date(date(2023, 1, 1), 1).unwrap(), date(2023, 1, 15));
    }

    #[test]
    fn test_one_month_after() {
        assert_eq!(one_month_after(date(2023, 2, 15)).unwrap(), date(2023, 3, 15));
        assert_eq!(one_month_after(date(2023, 4, 15)).unwrap(), date(2023, 5, 15));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let monthly = Frequency::new(FrequencyUnit::Months, u32::MAX);
        assert!(monthly.nth_date(date(2023, 1, 1), 2).is_err());
    }
}
