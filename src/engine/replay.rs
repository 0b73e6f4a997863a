//! Deterministic replay of a loan's history.
//!
//! The installment schedule is never edited in place by commands. Every
//! mutation stages a new ledger and the engine folds all non-reversed
//! transactions and charges, in `(date, sequence)` order, over an empty
//! schedule. The same inputs always produce the same [`ReplayOutcome`].

use crate::core::error::LoanError;
use crate::core::ids::TransactionId;
use crate::core::installment::{InstallmentKind, Schedule};
use crate::core::loan::{LoanCharge, LoanStatus, LoanTerms};
use crate::core::money::split_evenly;
use crate::core::transaction::{Transaction, TransactionKind, TransactionLedger};
use crate::engine::allocation::{Allocation, AllocationStrategy, OldestDueFirst};
use crate::engine::reage::ReAgePlanner;
use chrono::NaiveDate;
use log::{debug, trace};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A dated input of the fold.
#[derive(Debug, Clone, Copy)]
enum ReplayEvent<'a> {
    Transaction(&'a Transaction),
    Charge(&'a LoanCharge),
}

impl ReplayEvent<'_> {
    fn key(&self) -> (NaiveDate, u64) {
        match self {
            ReplayEvent::Transaction(tx) => tx.replay_key(),
            ReplayEvent::Charge(charge) => (charge.due_date(), charge.sequence()),
        }
    }
}

/// Everything the fold derives from a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub schedule: Schedule,
    /// Amounts of re-age transactions as computed by this replay.
    pub restated: Vec<(TransactionId, Decimal)>,
    /// What each payment still settles, after chargebacks.
    pub allocations: BTreeMap<TransactionId, Allocation>,
    pub overpaid: Decimal,
    pub disbursed: Decimal,
    pub status: LoanStatus,
    pub maturity_date: Option<NaiveDate>,
}

impl ReplayOutcome {
    pub fn restated_amount(&self, id: TransactionId) -> Option<Decimal> {
        self.restated
            .iter()
            .find(|(restated, _)| *restated == id)
            .map(|(_, amount)| *amount)
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.schedule.total_outstanding()
    }
}

#[derive(Default)]
struct ReplayState {
    schedule: Schedule,
    restated: Vec<(TransactionId, Decimal)>,
    allocations: BTreeMap<TransactionId, Allocation>,
    overpaid: Decimal,
    disbursed: Decimal,
}

/// Rebuilds loan state from history with an injected allocation strategy.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    allocation: Arc<dyn AllocationStrategy>,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new(Arc::new(OldestDueFirst::new()))
    }
}

impl ReplayEngine {
    pub fn new(allocation: Arc<dyn AllocationStrategy>) -> Self {
        Self { allocation }
    }

    pub fn allocation(&self) -> &dyn AllocationStrategy {
        self.allocation.as_ref()
    }

    /// Fold the whole history from loan inception.
    ///
    /// Fails without side effects when an event cannot be applied, e.g. a
    /// chargeback larger than what its payment still settles.
    pub fn replay(
        &self,
        terms: &LoanTerms,
        charges: &[LoanCharge],
        ledger: &TransactionLedger,
    ) -> Result<ReplayOutcome, LoanError> {
        let mut events: Vec<ReplayEvent<'_>> = ledger
            .replay_order()
            .into_iter()
            .map(ReplayEvent::Transaction)
            .chain(charges.iter().map(ReplayEvent::Charge))
            .collect();
        events.sort_by_key(|event| event.key());

        let mut state = ReplayState::default();
        for event in &events {
            let (date, _) = event.key();
            match event {
                ReplayEvent::Transaction(tx) => self.apply_transaction(&mut state, terms, tx)?,
                ReplayEvent::Charge(charge) => apply_charge(&mut state, charge),
            }
            self.apply_credit(&mut state);
            state.schedule.settle_statuses(date);
        }

        let status = LoanStatus::derive(
            state.disbursed,
            state.overpaid,
            state.schedule.total_outstanding(),
        );
        let maturity_date = state.schedule.maturity_date();
        debug!(
            "replayed {} events: {} installments, status {}, outstanding {}",
            events.len(),
            state.schedule.len(),
            status,
            state.schedule.total_outstanding()
        );

        Ok(ReplayOutcome {
            schedule: state.schedule,
            restated: state.restated,
            allocations: state.allocations,
            overpaid: state.overpaid,
            disbursed: state.disbursed,
            status,
            maturity_date,
        })
    }

    /// Spend credit held by earlier payments on whatever balance the last
    /// event opened. The spent part joins the payment's own allocation, so a
    /// chargeback of that payment reopens it.
    fn apply_credit(&self, state: &mut ReplayState) {
        if state.overpaid <= Decimal::ZERO || state.schedule.total_outstanding().is_zero() {
            return;
        }
        for (id, allocation) in state.allocations.iter_mut() {
            if allocation.unallocated <= Decimal::ZERO {
                continue;
            }
            let spent = self.allocation.allocate(&mut state.schedule, allocation.unallocated);
            let used = allocation.unallocated - spent.unallocated;
            if used > Decimal::ZERO {
                trace!("credit of {} settles {}", id, used);
                allocation.portions.extend(spent.portions);
                allocation.unallocated = spent.unallocated;
                state.overpaid -= used;
            }
        }
    }

    fn apply_transaction(
        &self,
        state: &mut ReplayState,
        terms: &LoanTerms,
        tx: &Transaction,
    ) -> Result<(), LoanError> {
        trace!("apply {} {} {} on {}", tx.id(), tx.kind(), tx.amount(), tx.date());
        match tx.kind() {
            TransactionKind::Disbursement => apply_disbursement(state, terms, tx.date(), tx.amount()),
            TransactionKind::DownPayment | TransactionKind::Repayment => {
                let allocation = self.allocation.allocate(&mut state.schedule, tx.amount());
                state.overpaid += allocation.unallocated;
                state.allocations.insert(tx.id(), allocation);
                Ok(())
            }
            TransactionKind::Chargeback { original } => {
                apply_chargeback(state, *original, tx.amount())
            }
            TransactionKind::ReAge(event) => {
                let amount = ReAgePlanner::collapse(&mut state.schedule, event, tx.date())?;
                state.restated.push((tx.id(), amount));
                Ok(())
            }
            // The target is flagged reversed in the ledger, so the plan it
            // replaced is rebuilt without it.
            TransactionKind::UndoReAge { .. } => Ok(()),
        }
    }
}

fn apply_disbursement(
    state: &mut ReplayState,
    terms: &LoanTerms,
    date: NaiveDate,
    amount: Decimal,
) -> Result<(), LoanError> {
    let down_payment = terms.down_payment_amount(amount);
    let first_tranche = state.disbursed.is_zero();
    state.disbursed += amount;

    if down_payment > Decimal::ZERO {
        state
            .schedule
            .open(InstallmentKind::DownPayment, date, down_payment, Decimal::ZERO);
    }
    let financed = amount - down_payment;
    let frequency = terms.repayment_frequency;

    if first_tranche {
        let parts = split_evenly(financed, terms.number_of_installments);
        for (n, part) in (1..).zip(parts) {
            let due = frequency.nth_date(date, n)?;
            state
                .schedule
                .open(InstallmentKind::Regular, due, part, terms.interest_for(part));
        }
        return Ok(());
    }

    let open_future: Vec<u32> = state
        .schedule
        .installments()
        .iter()
        .filter(|i| {
            !i.is_superseded()
                && i.due_date() > date
                && matches!(i.kind(), InstallmentKind::Regular | InstallmentKind::ReAged)
        })
        .map(|i| i.number())
        .collect();

    if open_future.is_empty() {
        let due = frequency.nth_date(date, 1)?;
        state
            .schedule
            .open(InstallmentKind::Regular, due, financed, terms.interest_for(financed));
        return Ok(());
    }

    let parts = split_evenly(financed, open_future.len() as u32);
    for (number, part) in open_future.into_iter().zip(parts) {
        if let Some(installment) = state.schedule.get_mut(number) {
            installment.principal.due += part;
            installment.interest.due += terms.interest_for(part);
        }
    }
    Ok(())
}

fn apply_chargeback(
    state: &mut ReplayState,
    original: TransactionId,
    requested: Decimal,
) -> Result<(), LoanError> {
    let available = state
        .allocations
        .get(&original)
        .map(Allocation::total)
        .unwrap_or(Decimal::ZERO);
    if requested > available {
        return Err(LoanError::InvalidChargebackAmount {
            target: original,
            requested,
            available,
        });
    }
    let Some(allocation) = state.allocations.get_mut(&original) else {
        return Ok(());
    };

    let mut remaining = requested;
    let from_credit = allocation.unallocated.min(remaining);
    allocation.unallocated -= from_credit;
    state.overpaid -= from_credit;
    remaining -= from_credit;

    while remaining > Decimal::ZERO {
        let Some(portion) = allocation.portions.last_mut() else {
            break;
        };
        let take = portion.amount.min(remaining);
        if let Some(installment) = state.schedule.get_mut(portion.installment) {
            installment.component_mut(portion.component).paid -= take;
        }
        portion.amount -= take;
        remaining -= take;
        if portion.amount.is_zero() {
            allocation.portions.pop();
        }
    }
    Ok(())
}

fn apply_charge(state: &mut ReplayState, charge: &LoanCharge) {
    let target = state
        .schedule
        .installments()
        .iter()
        .find(|i| {
            !i.is_superseded()
                && i.kind() != InstallmentKind::DownPayment
                && i.due_date() >= charge.due_date()
        })
        .map(|i| i.number());

    let number = target.unwrap_or_else(|| {
        state.schedule.open(
            InstallmentKind::Additional,
            charge.due_date(),
            Decimal::ZERO,
            Decimal::ZERO,
        )
    });
    if let Some(installment) = state.schedule.get_mut(number) {
        installment.component_mut(charge.kind().component()).due += charge.amount();
    }
}
