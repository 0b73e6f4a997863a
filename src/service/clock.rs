use chrono::{Days, NaiveDate};
use parking_lot::RwLock;
use std::fmt;

/// Source of the business date commands are validated against.
///
/// The engine never reads the wall clock; replaying the same ledger under
/// the same business date is reproducible.
pub trait BusinessClock: fmt::Debug + Send + Sync {
    fn business_date(&self) -> NaiveDate;
}

/// A clock that never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(NaiveDate);

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl BusinessClock for FixedClock {
    fn business_date(&self) -> NaiveDate {
        self.0
    }
}

/// A clock moved explicitly by its owner, e.g. a scenario runner.
#[derive(Debug)]
pub struct ManualClock {
    date: RwLock<NaiveDate>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.write() = date;
    }

    /// Move forward by `days`. Saturates at the last representable date.
    pub fn advance(&self, days: u64) -> NaiveDate {
        let mut date = self.date.write();
        if let Some(next) = date.checked_add_days(Days::new(days)) {
            *date = next;
        }
        *date
    }
}

impl BusinessClock for ManualClock {
    fn business_date(&self) -> NaiveDate {
        *self.date.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_manual_clock_moves() {
        let clock = ManualClock::new(date(2023, 1, 1));
        assert_eq!(clock.business_date(), date(2023, 1, 1));

        clock.set(date(2023, 4, 12));
        assert_eq!(clock.business_date(), date(2023, 4, 12));

        assert_eq!(clock.advance(1), date(2023, 4, 13));
        assert_eq!(clock.business_date(), date(2023, 4, 13));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(date(2023, 3, 1));
        assert_eq!(clock.business_date(), date(2023, 3, 1));
    }
}
