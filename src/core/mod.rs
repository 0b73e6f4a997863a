//! Foundational types: money, dates, installments, the transaction ledger
//! and the loan aggregate that owns them.

pub mod error;
pub mod frequency;
pub mod ids;
pub mod installment;
pub mod loan;
pub mod money;
pub mod transaction;
