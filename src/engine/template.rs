use crate::core::error::LoanError;
use crate::core::frequency::one_month_after;
use crate::core::installment::Installment;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defaults proposed to a caller about to re-age a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReAgeTemplate {
    pub number_of_past_installments: usize,
    pub number_of_future_installments: usize,
    pub next_installment_due_date: Option<NaiveDate>,
    pub calculated_start_date: NaiveDate,
}

impl fmt::Display for ReAgeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Re-age Template ===")?;
        writeln!(f, "Past installments:     {}", self.number_of_past_installments)?;
        writeln!(f, "Future installments:   {}", self.number_of_future_installments)?;
        match self.next_installment_due_date {
            Some(date) => writeln!(f, "Next installment due:  {}", date)?,
            None => writeln!(f, "Next installment due:  -")?,
        }
        writeln!(f, "Calculated start date: {}", self.calculated_start_date)
    }
}

/// Partition the current plan around `business_date`.
///
/// An installment due on the business date counts as past. Installments
/// superseded by a re-age are not part of the current plan and are skipped.
/// The proposed start date is always one calendar month after the business
/// date, whatever the loan's own repayment frequency.
pub fn re_age_template<'a, I>(installments: I, business_date: NaiveDate) -> Result<ReAgeTemplate, LoanError>
where
    I: IntoIterator<Item = &'a Installment>,
{
    let mut past = 0;
    let mut future = 0;
    let mut next_due: Option<NaiveDate> = None;

    for installment in installments.into_iter().filter(|i| !i.is_superseded()) {
        let due = installment.due_date();
        if due <= business_date {
            past += 1;
        } else {
            future += 1;
            next_due = Some(next_due.map_or(due, |d| d.min(due)));
        }
    }

    Ok(ReAgeTemplate {
        number_of_past_installments: past,
        number_of_future_installments: future,
        next_installment_due_date: next_due,
        calculated_start_date: one_month_after(business_date)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::installment::{InstallmentKind, Schedule};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Down payment on 1 Jan and three monthly installments.
    fn plan() -> Schedule {
        let mut schedule = Schedule::new();
        schedule.open(InstallmentKind::DownPayment, date(2023, 1, 1), dec!(250), Decimal::ZERO);
        for month in 2..=4 {
            schedule.open(InstallmentKind::Regular, date(2023, month, 1), dec!(250), Decimal::ZERO);
        }
        schedule
    }

    #[test]
    fn test_mix_of_past_and_future() {
        let template = re_age_template(plan().installments(), date(2023, 2, 15)).unwrap();
        assert_eq!(template.number_of_past_installments, 2);
        assert_eq!(template.number_of_future_installments, 2);
        assert_eq!(template.next_installment_due_date, Some(date(2023, 3, 1)));
        assert_eq!(template.calculated_start_date, date(2023, 3, 15));
    }

    #[test]
    fn test_due_on_business_date_counts_as_past() {
        let template = re_age_template(plan().installments(), date(2023, 3, 1)).unwrap();
        assert_eq!(template.number_of_past_installments, 3);
        assert_eq!(template.number_of_future_installments, 1);
        assert_eq!(template.next_installment_due_date, Some(date(2023, 4, 1)));
        assert_eq!(template.calculated_start_date, date(2023, 4, 1));
    }

    #[test]
    fn test_all_past() {
        let template = re_age_template(plan().installments(), date(2023, 4, 15)).unwrap();
        assert_eq!(template.number_of_past_installments, 4);
        assert_eq!(template.number_of_future_installments, 0);
        assert_eq!(template.next_installment_due_date, None);
        assert_eq!(template.calculated_start_date, date(2023, 5, 15));
    }

    #[test]
    fn test_serializes_camel_case() {
        let template = re_age_template(plan().installments(), date(2023, 1, 1)).unwrap();
        let json = serde_json::to_value(template).unwrap();
        assert_eq!(json["numberOfPastInstallments"], 1);
        assert_eq!(json["numberOfFutureInstallments"], 3);
        assert_eq!(json["calculatedStartDate"], "2023-02-01");
    }
}
