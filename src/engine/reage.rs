//! Re-aging: collapsing outstanding obligations into a new installment plan.
//!
//! The collapse runs inside replay, at the re-age transaction's position in
//! the event order. Its result is therefore restated whenever earlier
//! history changes.

pub use crate::core::transaction::{InterestHandlingType, ReAgeEvent};

use crate::core::error::LoanError;
use crate::core::frequency::Frequency;
use crate::core::installment::{InstallmentKind, Schedule};
use crate::core::money::{check_amount, split_evenly, MAX_INSTALLMENTS};
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller input of a re-age command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReAgeRequest {
    pub frequency: Frequency,
    pub number_of_installments: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub interest_handling: InterestHandlingType,
    /// Expected collapsed amount. When supplied it must match exactly.
    #[serde(default)]
    pub transaction_amount: Option<Decimal>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl ReAgeRequest {
    pub fn new(frequency: Frequency, number_of_installments: u32, start_date: NaiveDate) -> Self {
        Self {
            frequency,
            number_of_installments,
            start_date,
            interest_handling: InterestHandlingType::Default,
            transaction_amount: None,
            external_id: None,
        }
    }

    pub fn with_interest_handling(mut self, handling: InterestHandlingType) -> Self {
        self.interest_handling = handling;
        self
    }

    pub fn with_transaction_amount(mut self, amount: Decimal) -> Self {
        self.transaction_amount = Some(amount);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Input checks that need no loan state.
    pub fn validate(&self, as_of: NaiveDate) -> Result<(), LoanError> {
        if let Some(amount) = self.transaction_amount {
            check_amount("reAge.transactionAmount", amount)?;
        }
        if self.number_of_installments == 0 {
            return Err(LoanError::InvalidParameter {
                field: "reAge.numberOfInstallments",
                reason: "must be at least 1",
            });
        }
        if self.number_of_installments > MAX_INSTALLMENTS {
            return Err(LoanError::InvalidParameter {
                field: "reAge.numberOfInstallments",
                reason: "must be at most 1200",
            });
        }
        if self.frequency.every == 0 {
            return Err(LoanError::InvalidParameter {
                field: "reAge.frequencyNumber",
                reason: "must be at least 1",
            });
        }
        if self.start_date < as_of {
            return Err(LoanError::DateTooEarly {
                date: self.start_date,
                earliest: as_of,
            });
        }
        Ok(())
    }

    pub fn event(&self) -> ReAgeEvent {
        ReAgeEvent {
            frequency: self.frequency,
            number_of_installments: self.number_of_installments,
            start_date: self.start_date,
            interest_handling: self.interest_handling,
        }
    }
}

/// Interest taken from one installment by a collapse.
fn collapsible_interest(
    interest_outstanding: Decimal,
    due_date: NaiveDate,
    as_of: NaiveDate,
    handling: InterestHandlingType,
) -> Decimal {
    match handling {
        InterestHandlingType::Default | InterestHandlingType::WaiveInterest => Decimal::ZERO,
        InterestHandlingType::EqualAmortizationPayableInterest if due_date > as_of => Decimal::ZERO,
        InterestHandlingType::EqualAmortizationPayableInterest
        | InterestHandlingType::EqualAmortizationFullInterest => interest_outstanding,
    }
}

pub struct ReAgePlanner;

impl ReAgePlanner {
    /// Amount a re-age as of `as_of` would collapse, without touching the
    /// schedule.
    pub fn collapsible_amount(
        schedule: &Schedule,
        as_of: NaiveDate,
        handling: InterestHandlingType,
    ) -> Decimal {
        schedule
            .installments()
            .iter()
            .map(|i| {
                i.principal.outstanding()
                    + collapsible_interest(i.interest.outstanding(), i.due_date(), as_of, handling)
            })
            .sum()
    }

    /// Collapse every installment with outstanding principal and generate
    /// the new plan. Returns the collapsed amount.
    ///
    /// Fully settled installments and fee or penalty balances are left where
    /// they are. A collapse with nothing to move is a no-op returning zero.
    pub fn collapse(
        schedule: &mut Schedule,
        event: &ReAgeEvent,
        as_of: NaiveDate,
    ) -> Result<Decimal, LoanError> {
        let handling = event.interest_handling;
        let mut principal = Decimal::ZERO;
        let mut interest = Decimal::ZERO;

        // Due dates must be resolvable before anything is mutated.
        let due_dates = (0..event.number_of_installments)
            .map(|n| event.frequency.nth_date(event.start_date, n))
            .collect::<Result<Vec<_>, _>>()?;

        let amount = Self::collapsible_amount(schedule, as_of, handling);
        if amount <= Decimal::ZERO {
            warn!("re-age on {} found nothing to collapse", as_of);
            return Ok(Decimal::ZERO);
        }

        for installment in schedule.iter_mut() {
            let principal_open = installment.principal.outstanding();
            let interest_open = installment.interest.outstanding();
            if principal_open <= Decimal::ZERO && interest_open <= Decimal::ZERO {
                continue;
            }
            let due_date = installment.due_date();
            let mut touched = false;

            if principal_open > Decimal::ZERO {
                principal += installment.principal.settle_at_paid();
                touched = true;
            }

            if interest_open > Decimal::ZERO {
                match handling {
                    InterestHandlingType::Default => {}
                    InterestHandlingType::WaiveInterest => {
                        installment.interest.waived += interest_open;
                        touched = true;
                    }
                    InterestHandlingType::EqualAmortizationPayableInterest
                    | InterestHandlingType::EqualAmortizationFullInterest => {
                        interest += collapsible_interest(interest_open, due_date, as_of, handling);
                        installment.interest.settle_at_paid();
                        touched = true;
                    }
                }
            }

            if touched {
                installment.mark_superseded(as_of);
            }
        }

        let principal_parts = split_evenly(principal, event.number_of_installments);
        let interest_parts = split_evenly(interest, event.number_of_installments);
        for ((due_date, p), i) in due_dates.into_iter().zip(principal_parts).zip(interest_parts) {
            schedule.open(InstallmentKind::ReAged, due_date, p, i);
        }

        debug!(
            "re-age on {} collapsed {} principal and {} interest into {} installments",
            as_of, principal, interest, event.number_of_installments
        );
        Ok(principal + interest)
    }
}
