use crate::core::ids::{LoanId, TransactionId};
use crate::core::loan::ChargeKind;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Domain event emitted after a command has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoanEvent {
    Created {
        loan: LoanId,
    },
    Disbursed {
        loan: LoanId,
        transaction: TransactionId,
        amount: Decimal,
        date: NaiveDate,
    },
    PaymentBooked {
        loan: LoanId,
        transaction: TransactionId,
        amount: Decimal,
        date: NaiveDate,
    },
    ChargedBack {
        loan: LoanId,
        transaction: TransactionId,
        original: TransactionId,
        amount: Decimal,
    },
    ReAged {
        loan: LoanId,
        transaction: TransactionId,
        amount: Decimal,
    },
    ReAgeUndone {
        loan: LoanId,
        transaction: TransactionId,
        re_age: TransactionId,
    },
    Reversed {
        loan: LoanId,
        transaction: TransactionId,
        reversal_date: NaiveDate,
    },
    ChargeAdded {
        loan: LoanId,
        kind: ChargeKind,
        amount: Decimal,
        due_date: NaiveDate,
    },
}

impl LoanEvent {
    pub fn loan(&self) -> LoanId {
        match self {
            LoanEvent::Created { loan }
            | LoanEvent::Disbursed { loan, .. }
            | LoanEvent::PaymentBooked { loan, .. }
            | LoanEvent::ChargedBack { loan, .. }
            | LoanEvent::ReAged { loan, .. }
            | LoanEvent::ReAgeUndone { loan, .. }
            | LoanEvent::Reversed { loan, .. }
            | LoanEvent::ChargeAdded { loan, .. } => *loan,
        }
    }
}
