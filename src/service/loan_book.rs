use crate::core::error::LoanError;
use crate::core::ids::{LoanId, TransactionId};
use crate::core::installment::InstallmentView;
use crate::core::loan::{ChargeKind, Loan, LoanSnapshot, LoanTerms, ReAgePreview};
use crate::core::transaction::{TransactionKind, TransactionView};
use crate::engine::reage::ReAgeRequest;
use crate::engine::replay::ReplayEngine;
use crate::engine::template::ReAgeTemplate;
use crate::service::clock::BusinessClock;
use crate::service::events::LoanEvent;
use chrono::NaiveDate;
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry of loans keyed by id.
///
/// Each loan sits behind its own lock: a command holds the loan's write lock
/// until its replay has been committed, so no reader ever sees a half
/// applied schedule. Commands on different loans do not contend beyond the
/// short registry lookup.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::NaiveDate;
/// use loan_replay::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let jan = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let book = LoanBook::new(Arc::new(FixedClock::new(jan)));
///
/// let terms = LoanTerms {
///     currency: CurrencyCode::default(),
///     principal: dec!(1000),
///     down_payment: None,
///     repayment_frequency: Frequency::monthly(),
///     number_of_installments: 4,
///     interest_rate_per_period: dec!(0),
/// };
/// let loan = book.create_loan(terms).unwrap();
/// book.disburse(loan, dec!(1000), jan).unwrap();
///
/// let schedule = book.schedule(loan).unwrap();
/// assert_eq!(schedule.len(), 4);
/// assert_eq!(schedule[0].principal_due, dec!(250));
/// ```
#[derive(Debug)]
pub struct LoanBook {
    clock: Arc<dyn BusinessClock>,
    engine: ReplayEngine,
    loans: RwLock<HashMap<LoanId, Arc<RwLock<Loan>>>>,
    next_id: AtomicU64,
    outbox: Mutex<Vec<LoanEvent>>,
}

impl LoanBook {
    pub fn new(clock: Arc<dyn BusinessClock>) -> Self {
        Self::with_engine(clock, ReplayEngine::default())
    }

    pub fn with_engine(clock: Arc<dyn BusinessClock>, engine: ReplayEngine) -> Self {
        Self {
            clock,
            engine,
            loans: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn business_date(&self) -> NaiveDate {
        self.clock.business_date()
    }

    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }

    pub fn loan_ids(&self) -> Vec<LoanId> {
        let mut ids: Vec<LoanId> = self.loans.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn loan(&self, id: LoanId) -> Result<Arc<RwLock<Loan>>, LoanError> {
        self.loans
            .read()
            .get(&id)
            .cloned()
            .ok_or(LoanError::LoanNotFound(id))
    }

    fn publish(&self, event: LoanEvent) {
        self.outbox.lock().push(event);
    }

    /// Run a command under the loan's write lock. Failures are logged and
    /// leave the loan untouched.
    fn command<T>(
        &self,
        id: LoanId,
        op: &'static str,
        f: impl FnOnce(&mut Loan, NaiveDate) -> Result<T, LoanError>,
    ) -> Result<T, LoanError> {
        let handle = self.loan(id)?;
        let mut loan = handle.write();
        let business_date = self.business_date();
        f(&mut *loan, business_date).map_err(|err| {
            warn!("loan {} {} rejected [{}]: {}", id, op, err.code(), err);
            err
        })
    }

    fn query<T>(&self, id: LoanId, f: impl FnOnce(&Loan) -> T) -> Result<T, LoanError> {
        let handle = self.loan(id)?;
        let loan = handle.read();
        Ok(f(&*loan))
    }

    // --- Commands ---

    pub fn create_loan(&self, terms: LoanTerms) -> Result<LoanId, LoanError> {
        let id = LoanId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let loan = Loan::new(id, terms)?;
        self.loans.write().insert(id, Arc::new(RwLock::new(loan)));
        self.publish(LoanEvent::Created { loan: id });
        info!("loan {} created", id);
        Ok(id)
    }

    pub fn disburse(
        &self,
        id: LoanId,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<Vec<TransactionId>, LoanError> {
        self.command(id, "disburse", |loan, business_date| {
            let booked = loan.disburse(&self.engine, amount, date, business_date)?;
            for tx in booked.iter().filter_map(|t| loan.ledger().get(*t)) {
                let event = match tx.kind() {
                    TransactionKind::Disbursement => LoanEvent::Disbursed {
                        loan: id,
                        transaction: tx.id(),
                        amount: tx.amount(),
                        date: tx.date(),
                    },
                    _ => LoanEvent::PaymentBooked {
                        loan: id,
                        transaction: tx.id(),
                        amount: tx.amount(),
                        date: tx.date(),
                    },
                };
                self.publish(event);
            }
            Ok(booked)
        })
    }

    pub fn repay(
        &self,
        id: LoanId,
        amount: Decimal,
        date: NaiveDate,
        external_id: Option<String>,
    ) -> Result<TransactionId, LoanError> {
        self.command(id, "repay", |loan, business_date| {
            let tx = loan.repay(&self.engine, amount, date, external_id, business_date)?;
            self.publish(LoanEvent::PaymentBooked {
                loan: id,
                transaction: tx,
                amount,
                date,
            });
            Ok(tx)
        })
    }

    /// Manual down payment, for terms without automatic down payments.
    pub fn pay_down_payment(
        &self,
        id: LoanId,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        self.command(id, "down payment", |loan, business_date| {
            let tx = loan.pay_down_payment(&self.engine, amount, date, business_date)?;
            self.publish(LoanEvent::PaymentBooked {
                loan: id,
                transaction: tx,
                amount,
                date,
            });
            Ok(tx)
        })
    }

    pub fn chargeback(
        &self,
        id: LoanId,
        transaction_external_id: &str,
        amount: Decimal,
    ) -> Result<TransactionId, LoanError> {
        self.command(id, "chargeback", |loan, business_date| {
            let tx = loan.chargeback(&self.engine, transaction_external_id, amount, business_date)?;
            if let Some(TransactionKind::Chargeback { original }) =
                loan.ledger().get(tx).map(|t| t.kind().clone())
            {
                self.publish(LoanEvent::ChargedBack {
                    loan: id,
                    transaction: tx,
                    original,
                    amount,
                });
            }
            Ok(tx)
        })
    }

    pub fn re_age(&self, id: LoanId, request: &ReAgeRequest) -> Result<TransactionId, LoanError> {
        self.command(id, "re-age", |loan, business_date| {
            let tx = loan.re_age(&self.engine, request, business_date)?;
            let amount = loan
                .ledger()
                .get(tx)
                .map(|t| t.amount())
                .unwrap_or(Decimal::ZERO);
            self.publish(LoanEvent::ReAged {
                loan: id,
                transaction: tx,
                amount,
            });
            Ok(tx)
        })
    }

    pub fn preview_re_age(&self, id: LoanId, request: &ReAgeRequest) -> Result<ReAgePreview, LoanError> {
        let business_date = self.business_date();
        self.query(id, |loan| loan.preview_re_age(&self.engine, request, business_date))?
    }

    pub fn undo_re_age(&self, id: LoanId) -> Result<TransactionId, LoanError> {
        self.command(id, "undo re-age", |loan, business_date| {
            let tx = loan.undo_re_age(&self.engine, business_date)?;
            if let Some(TransactionKind::UndoReAge { re_age }) =
                loan.ledger().get(tx).map(|t| t.kind().clone())
            {
                self.publish(LoanEvent::ReAgeUndone {
                    loan: id,
                    transaction: tx,
                    re_age,
                });
            }
            Ok(tx)
        })
    }

    pub fn reverse(
        &self,
        id: LoanId,
        transaction: TransactionId,
        reversal_date: NaiveDate,
    ) -> Result<(), LoanError> {
        self.command(id, "reverse", |loan, business_date| {
            loan.reverse(&self.engine, transaction, reversal_date, business_date)?;
            self.publish(LoanEvent::Reversed {
                loan: id,
                transaction,
                reversal_date,
            });
            Ok(())
        })
    }

    pub fn add_charge(
        &self,
        id: LoanId,
        kind: ChargeKind,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Result<u64, LoanError> {
        self.command(id, "add charge", |loan, _| {
            let sequence = loan.add_charge(&self.engine, kind, amount, due_date)?;
            self.publish(LoanEvent::ChargeAdded {
                loan: id,
                kind,
                amount,
                due_date,
            });
            Ok(sequence)
        })
    }

    /// Replay an unchanged history with this book's engine.
    pub fn rebuild(&self, id: LoanId) -> Result<(), LoanError> {
        self.command(id, "rebuild", |loan, _| loan.rebuild(&self.engine))
    }

    // --- Queries ---

    pub fn re_age_template(&self, id: LoanId) -> Result<ReAgeTemplate, LoanError> {
        let business_date = self.business_date();
        self.query(id, |loan| loan.re_age_template(business_date))?
    }

    pub fn transactions(&self, id: LoanId) -> Result<Vec<TransactionView>, LoanError> {
        self.query(id, |loan| loan.ledger().views())
    }

    pub fn schedule(&self, id: LoanId) -> Result<Vec<InstallmentView>, LoanError> {
        self.query(id, |loan| loan.schedule().views())
    }

    pub fn snapshot(&self, id: LoanId) -> Result<LoanSnapshot, LoanError> {
        self.query(id, Loan::snapshot)
    }

    /// Take every event committed since the last drain, oldest first.
    pub fn drain_events(&self) -> Vec<LoanEvent> {
        std::mem::take(&mut *self.outbox.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frequency::Frequency;
    use crate::core::loan::DownPaymentTerms;
    use crate::core::money::CurrencyCode;
    use crate::service::clock::ManualClock;
    use rust_decimal_macros::dec;
    use std::thread;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn terms() -> LoanTerms {
        LoanTerms {
            currency: CurrencyCode::default(),
            principal: dec!(1250),
            down_payment: Some(DownPaymentTerms {
                percentage: dec!(25),
                auto_repayment: true,
            }),
            repayment_frequency: Frequency::monthly(),
            number_of_installments: 3,
            interest_rate_per_period: Decimal::ZERO,
        }
    }

    #[test]
    fn test_unknown_loan() {
        let book = LoanBook::new(Arc::new(ManualClock::new(date(2023, 1, 1))));
        let missing = LoanId::new(42);
        assert_eq!(book.snapshot(missing).unwrap_err(), LoanError::LoanNotFound(missing));
    }

    #[test]
    fn test_events_follow_commits() {
        let clock = Arc::new(ManualClock::new(date(2023, 1, 1)));
        let book = LoanBook::new(clock.clone());
        let loan = book.create_loan(terms()).unwrap();
        book.disburse(loan, dec!(1250), date(2023, 1, 1)).unwrap();

        clock.set(date(2023, 2, 1));
        assert!(book.repay(loan, Decimal::ZERO, date(2023, 2, 1), None).is_err());
        book.repay(loan, dec!(100), date(2023, 2, 1), None).unwrap();

        let events = book.drain_events();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], LoanEvent::Created { .. }));
        assert!(matches!(events[1], LoanEvent::Disbursed { .. }));
        assert!(matches!(events[2], LoanEvent::PaymentBooked { amount, .. } if amount == dec!(312.5)));
        assert!(matches!(events[3], LoanEvent::PaymentBooked { amount, .. } if amount == dec!(100)));
        assert!(events.iter().all(|e| e.loan() == loan));
        assert!(book.drain_events().is_empty());
    }

    #[test]
    fn test_manual_down_payment() {
        let jan = date(2023, 1, 1);
        let book = LoanBook::new(Arc::new(ManualClock::new(jan)));
        let mut manual = terms();
        manual.down_payment = Some(DownPaymentTerms {
            percentage: dec!(25),
            auto_repayment: false,
        });
        let loan = book.create_loan(manual).unwrap();
        assert_eq!(book.disburse(loan, dec!(1250), jan).unwrap().len(), 1);
        assert!(!book.schedule(loan).unwrap()[0].obligations_met);

        book.pay_down_payment(loan, dec!(312.5), jan).unwrap();
        let schedule = book.schedule(loan).unwrap();
        assert!(schedule[0].obligations_met);
        assert_eq!(book.snapshot(loan).unwrap().total_outstanding, dec!(937.5));
    }

    #[test]
    fn test_concurrent_loans_are_independent() {
        let book = Arc::new(LoanBook::new(Arc::new(ManualClock::new(date(2023, 3, 1)))));
        let ids: Vec<LoanId> = (0..4).map(|_| book.create_loan(terms()).unwrap()).collect();
        assert_eq!(book.loan_ids(), ids);
        for id in &ids {
            book.disburse(*id, dec!(1250), date(2023, 1, 1)).unwrap();
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let book = Arc::clone(&book);
                thread::spawn(move || {
                    for _ in 0..5 {
                        book.repay(id, dec!(10), date(2023, 2, 1), None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in ids {
            let snapshot = book.snapshot(id).unwrap();
            assert_eq!(snapshot.total_outstanding, dec!(887.5));
            assert_eq!(snapshot.version, 6);
        }
    }
}
