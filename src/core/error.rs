use crate::core::ids::{LoanId, TransactionId};
use crate::core::loan::LoanStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Class of a [`LoanError`], as seen by an external caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or missing input; rejected before the ledger is touched.
    Validation,
    /// Input conflicts with the derived loan state; rejected after the staged
    /// replay, nothing committed.
    Conflict,
    /// Unknown loan or transaction.
    NotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not-found",
        };
        f.write_str(label)
    }
}

/// Errors raised by loan commands and by the replay engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanError {
    #[error("loan {0} does not exist")]
    LoanNotFound(LoanId),

    #[error("transaction {0} does not exist")]
    TransactionNotFound(TransactionId),

    #[error("no transaction with external id {0}")]
    ExternalIdNotFound(String),

    #[error("loan has no active re-age transaction")]
    NoActiveReAge,

    #[error("transaction {0} is already reversed")]
    AlreadyReversed(TransactionId),

    #[error("{kind} transaction {id} cannot be reversed")]
    NotReversible { id: TransactionId, kind: &'static str },

    #[error("transaction {id} has an active chargeback {chargeback}")]
    HasActiveChargeback {
        id: TransactionId,
        chargeback: TransactionId,
    },

    #[error("{field} must be greater than zero, got {amount}")]
    NonPositiveAmount { field: &'static str, amount: Decimal },

    #[error("{field} {amount} exceeds the largest bookable amount")]
    AmountTooLarge { field: &'static str, amount: Decimal },

    #[error("{field} {amount} has more than two decimal places")]
    TooManyDecimals { field: &'static str, amount: Decimal },

    #[error("invalid {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: &'static str,
    },

    #[error("re-age amount {requested} does not match the calculated amount {calculated}")]
    ReAgeAmountMismatch {
        requested: Decimal,
        calculated: Decimal,
    },

    #[error("nothing is outstanding to re-age")]
    NothingToReAge,

    #[error("chargeback of {requested} exceeds the {available} still allocated to transaction {target}")]
    InvalidChargebackAmount {
        target: TransactionId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("{kind} transaction {id} cannot be charged back")]
    NotChargeable { id: TransactionId, kind: &'static str },

    #[error("transaction {0} is reversed")]
    TransactionReversed(TransactionId),

    #[error("date {date} is after the business date {business_date}")]
    DateInFuture {
        date: NaiveDate,
        business_date: NaiveDate,
    },

    #[error("date {date} is before {earliest}")]
    DateTooEarly { date: NaiveDate, earliest: NaiveDate },

    #[error("loan is not disbursed")]
    NotDisbursed,

    #[error("operation is not allowed while the loan is {0}")]
    InvalidStatus(LoanStatus),

    #[error("date arithmetic overflowed: {periods} periods after {anchor}")]
    DateOutOfRange { anchor: NaiveDate, periods: u32 },
}

impl LoanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::LoanNotFound(_)
            | LoanError::TransactionNotFound(_)
            | LoanError::ExternalIdNotFound(_)
            | LoanError::NoActiveReAge => ErrorKind::NotFound,

            LoanError::NonPositiveAmount { .. }
            | LoanError::AmountTooLarge { .. }
            | LoanError::TooManyDecimals { .. }
            | LoanError::InvalidParameter { .. }
            | LoanError::NotReversible { .. }
            | LoanError::NotChargeable { .. }
            | LoanError::DateInFuture { .. }
            | LoanError::DateTooEarly { .. }
            | LoanError::DateOutOfRange { .. } => ErrorKind::Validation,

            LoanError::AlreadyReversed(_)
            | LoanError::HasActiveChargeback { .. }
            | LoanError::ReAgeAmountMismatch { .. }
            | LoanError::NothingToReAge
            | LoanError::InvalidChargebackAmount { .. }
            | LoanError::TransactionReversed(_)
            | LoanError::NotDisbursed
            | LoanError::InvalidStatus(_) => ErrorKind::Conflict,
        }
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            LoanError::LoanNotFound(_) => "error.msg.loan.id.invalid",
            LoanError::TransactionNotFound(_) | LoanError::ExternalIdNotFound(_) => {
                "error.msg.loan.transaction.not.found"
            }
            LoanError::NoActiveReAge => "error.msg.loan.transaction.not.found",
            LoanError::AlreadyReversed(_) => "error.msg.loan.transaction.already.reversed",
            LoanError::NotReversible { .. } => "error.msg.loan.transaction.not.reversible",
            LoanError::HasActiveChargeback { .. } => {
                "error.msg.loan.transaction.has.active.chargeback"
            }
            LoanError::NonPositiveAmount { field, .. } => match *field {
                "reAge.transactionAmount" => {
                    "validation.msg.loan.reAge.transactionAmount.not.greater.than.zero"
                }
                _ => "validation.msg.loan.transactionAmount.not.greater.than.zero",
            },
            LoanError::AmountTooLarge { .. } => "validation.msg.loan.transactionAmount.exceeds.maximum",
            LoanError::TooManyDecimals { .. } => "validation.msg.loan.transactionAmount.scale.exceeded",
            LoanError::InvalidParameter { .. } => "validation.msg.loan.parameter.invalid",
            LoanError::ReAgeAmountMismatch { .. } => {
                "error.msg.loan.reage.amount.not.match.with.calculated.reage.amount"
            }
            LoanError::NothingToReAge => "error.msg.loan.reage.no.outstanding.balance",
            LoanError::InvalidChargebackAmount { .. } => {
                "error.msg.loan.chargeback.amount.exceeds.allocated"
            }
            LoanError::NotChargeable { .. } => "error.msg.loan.transaction.not.chargeable",
            LoanError::TransactionReversed(_) => "error.msg.loan.transaction.is.reversed",
            LoanError::DateInFuture { .. } => "validation.msg.loan.transactionDate.in.future",
            LoanError::DateTooEarly { .. } => "validation.msg.loan.transactionDate.too.early",
            LoanError::NotDisbursed => "error.msg.loan.not.disbursed",
            LoanError::InvalidStatus(_) => "error.msg.loan.status.invalid",
            LoanError::DateOutOfRange { .. } => "validation.msg.loan.date.out.of.range",
        }
    }
}
