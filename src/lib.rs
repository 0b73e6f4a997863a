//! # loan-replay
//!
//! Loan transaction ledger with full replay on every change.
//!
//! A loan's repayment schedule is never patched in place. Every command
//! appends to (or reverses an entry of) the transaction ledger and the whole
//! history is replayed from inception, so backdated payments, reversals,
//! chargebacks, re-ages and undone re-ages always produce the schedule the
//! final history implies.
//!
//! ## Architecture
//!
//! - **core**: Money, dates, installments, the transaction ledger and the loan aggregate
//! - **engine**: Replay, payment allocation, re-age planning and the re-age template
//! - **service**: Multi-loan book with per-loan locking, business clock and event outbox
//! - **config**: Loan products, overrides and engine settings loaded from JSON
//! - **simulation**: Scripted scenarios and seeded random histories

pub mod config;
pub mod core;
pub mod engine;
pub mod service;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{EngineConfig, LoanProduct, ProductOverrides};
    pub use crate::core::error::{ErrorKind, LoanError};
    pub use crate::core::frequency::{Frequency, FrequencyUnit};
    pub use crate::core::ids::{LoanId, TransactionId};
    pub use crate::core::installment::InstallmentView;
    pub use crate::core::loan::{ChargeKind, DownPaymentTerms, LoanSnapshot, LoanStatus, LoanTerms};
    pub use crate::core::money::CurrencyCode;
    pub use crate::core::transaction::TransactionView;
    pub use crate::engine::reage::{InterestHandlingType, ReAgeRequest};
    pub use crate::engine::replay::ReplayEngine;
    pub use crate::engine::template::ReAgeTemplate;
    pub use crate::service::{BusinessClock, FixedClock, LoanBook, LoanEvent, ManualClock};
}
