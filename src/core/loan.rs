use crate::core::error::LoanError;
use crate::core::frequency::Frequency;
use crate::core::ids::{LoanId, TransactionId};
use crate::core::installment::{ComponentKind, InstallmentView, Schedule};
use crate::core::money::{check_amount, percentage_of, round_money, CurrencyCode, MAX_INSTALLMENTS};
use crate::core::transaction::{TransactionKind, TransactionLedger, TransactionView};
use crate::engine::allocation::Allocation;
use crate::engine::reage::ReAgeRequest;
use crate::engine::replay::{ReplayEngine, ReplayOutcome};
use crate::engine::template::{re_age_template, ReAgeTemplate};
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Down payment taken on every disbursement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownPaymentTerms {
    /// Percent of each disbursed amount, 0 to 100.
    pub percentage: Decimal,
    /// Book the down payment automatically with the disbursement.
    pub auto_repayment: bool,
}

/// Contractual terms a loan is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Approved principal. Disbursements are not capped by it.
    pub principal: Decimal,
    #[serde(default)]
    pub down_payment: Option<DownPaymentTerms>,
    pub repayment_frequency: Frequency,
    pub number_of_installments: u32,
    /// Flat rate applied to each installment's principal portion.
    #[serde(default)]
    pub interest_rate_per_period: Decimal,
}

impl LoanTerms {
    pub fn validate(&self) -> Result<(), LoanError> {
        check_amount("principal", self.principal)?;
        if self.number_of_installments == 0 {
            return Err(LoanError::InvalidParameter {
                field: "numberOfRepayments",
                reason: "must be at least 1",
            });
        }
        if self.number_of_installments > MAX_INSTALLMENTS {
            return Err(LoanError::InvalidParameter {
                field: "numberOfRepayments",
                reason: "must be at most 1200",
            });
        }
        if self.repayment_frequency.every == 0 {
            return Err(LoanError::InvalidParameter {
                field: "repaymentEvery",
                reason: "must be at least 1",
            });
        }
        if let Some(dp) = &self.down_payment {
            if dp.percentage < Decimal::ZERO || dp.percentage > Decimal::ONE_HUNDRED {
                return Err(LoanError::InvalidParameter {
                    field: "disbursedAmountPercentageForDownPayment",
                    reason: "must be between 0 and 100",
                });
            }
        }
        if self.interest_rate_per_period < Decimal::ZERO {
            return Err(LoanError::InvalidParameter {
                field: "interestRatePerPeriod",
                reason: "must not be negative",
            });
        }
        if self.interest_rate_per_period > Decimal::ONE {
            return Err(LoanError::InvalidParameter {
                field: "interestRatePerPeriod",
                reason: "must be at most 1",
            });
        }
        Ok(())
    }

    /// Down payment due on a disbursement of `disbursed`.
    pub fn down_payment_amount(&self, disbursed: Decimal) -> Decimal {
        self.down_payment
            .map(|dp| percentage_of(disbursed, dp.percentage))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn auto_down_payment(&self) -> bool {
        self.down_payment.map(|dp| dp.auto_repayment).unwrap_or(false)
    }

    /// Interest charged on an installment carrying `principal`.
    pub fn interest_for(&self, principal: Decimal) -> Decimal {
        round_money(principal * self.interest_rate_per_period)
    }
}

/// Lifecycle state derived by replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// Nothing disbursed yet.
    Approved,
    Active,
    /// Nothing is owed and payments left credit over.
    Overpaid,
    ClosedObligationsMet,
}

impl LoanStatus {
    pub fn derive(disbursed: Decimal, overpaid: Decimal, outstanding: Decimal) -> Self {
        if disbursed.is_zero() {
            LoanStatus::Approved
        } else if !outstanding.is_zero() {
            LoanStatus::Active
        } else if overpaid > Decimal::ZERO {
            LoanStatus::Overpaid
        } else {
            LoanStatus::ClosedObligationsMet
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Overpaid => "overpaid",
            LoanStatus::ClosedObligationsMet => "closed (obligations met)",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Fee,
    Penalty,
}

impl ChargeKind {
    pub fn component(self) -> ComponentKind {
        match self {
            ChargeKind::Fee => ComponentKind::Fee,
            ChargeKind::Penalty => ComponentKind::Penalty,
        }
    }
}

/// A fee or penalty levied on the loan at a due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCharge {
    sequence: u64,
    kind: ChargeKind,
    amount: Decimal,
    due_date: NaiveDate,
}

impl LoanCharge {
    pub fn new(sequence: u64, kind: ChargeKind, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            sequence,
            kind,
            amount,
            due_date,
        }
    }

    // --- Accessors ---

    /// Position in the loan's event order, shared with ledger entries.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn kind(&self) -> ChargeKind {
        self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }
}

/// Schedule a re-age would produce, computed without committing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReAgePreview {
    pub amount: Decimal,
    pub installments: Vec<InstallmentView>,
    pub maturity_date: Option<NaiveDate>,
}

fn ensure_not_future(date: NaiveDate, business_date: NaiveDate) -> Result<(), LoanError> {
    if date > business_date {
        return Err(LoanError::DateInFuture {
            date,
            business_date,
        });
    }
    Ok(())
}

/// Aggregate root of one loan.
///
/// The ledger and the charges are the source of truth; the schedule, status,
/// maturity date and balances are whatever the last committed replay derived
/// from them. Every command works on a staged copy of the history, replays
/// it, and only swaps the result in when the replay succeeds.
#[derive(Debug, Clone)]
pub struct Loan {
    id: LoanId,
    terms: LoanTerms,
    ledger: TransactionLedger,
    charges: Vec<LoanCharge>,
    schedule: Schedule,
    allocations: BTreeMap<TransactionId, Allocation>,
    status: LoanStatus,
    maturity_date: Option<NaiveDate>,
    overpaid: Decimal,
    disbursed: Decimal,
    version: u64,
}

impl Loan {
    pub fn new(id: LoanId, terms: LoanTerms) -> Result<Self, LoanError> {
        terms.validate()?;
        Ok(Self {
            id,
            terms,
            ledger: TransactionLedger::new(),
            charges: Vec::new(),
            schedule: Schedule::new(),
            allocations: BTreeMap::new(),
            status: LoanStatus::Approved,
            maturity_date: None,
            overpaid: Decimal::ZERO,
            disbursed: Decimal::ZERO,
            version: 0,
        })
    }

    // --- Accessors ---

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn charges(&self) -> &[LoanCharge] {
        &self.charges
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn maturity_date(&self) -> Option<NaiveDate> {
        self.maturity_date
    }

    pub fn overpaid(&self) -> Decimal {
        self.overpaid
    }

    pub fn disbursed(&self) -> Decimal {
        self.disbursed
    }

    /// Incremented on every committed command.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// What a payment still settles, after chargebacks.
    pub fn allocation_of(&self, id: TransactionId) -> Option<&Allocation> {
        self.allocations.get(&id)
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.schedule.total_outstanding()
    }

    // --- Commands ---

    /// Book a disbursement and, when the terms ask for it, its automatic
    /// down payment. Returns the booked ids in order.
    pub fn disburse(
        &mut self,
        engine: &ReplayEngine,
        amount: Decimal,
        date: NaiveDate,
        business_date: NaiveDate,
    ) -> Result<Vec<TransactionId>, LoanError> {
        check_amount("transactionAmount", amount)?;
        ensure_not_future(date, business_date)?;

        let mut ledger = self.ledger.clone();
        let mut booked = vec![ledger.append(TransactionKind::Disbursement, date, amount, None, business_date)];
        let down_payment = self.terms.down_payment_amount(amount);
        if self.terms.auto_down_payment() && down_payment > Decimal::ZERO {
            booked.push(ledger.append(TransactionKind::DownPayment, date, down_payment, None, business_date));
        }

        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;
        self.commit(ledger, self.charges.clone(), outcome);
        info!("loan {} disbursed {} on {}", self.id, amount, date);
        Ok(booked)
    }

    /// Book a repayment, possibly backdated.
    pub fn repay(
        &mut self,
        engine: &ReplayEngine,
        amount: Decimal,
        date: NaiveDate,
        external_id: Option<String>,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        self.book_payment(engine, TransactionKind::Repayment, amount, date, external_id, business_date)
    }

    /// Book a manual down payment on a loan without automatic down payments.
    pub fn pay_down_payment(
        &mut self,
        engine: &ReplayEngine,
        amount: Decimal,
        date: NaiveDate,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        self.book_payment(engine, TransactionKind::DownPayment, amount, date, None, business_date)
    }

    fn book_payment(
        &mut self,
        engine: &ReplayEngine,
        kind: TransactionKind,
        amount: Decimal,
        date: NaiveDate,
        external_id: Option<String>,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        check_amount("transactionAmount", amount)?;
        ensure_not_future(date, business_date)?;
        let first = self
            .ledger
            .first_disbursement_date()
            .ok_or(LoanError::NotDisbursed)?;
        if date < first {
            return Err(LoanError::DateTooEarly {
                date,
                earliest: first,
            });
        }

        let mut ledger = self.ledger.clone();
        let id = ledger.append(kind, date, amount, external_id, business_date);
        debug!("loan {} replaying from {} for {}", self.id, date, id);
        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;
        self.commit(ledger, self.charges.clone(), outcome);
        info!("loan {} booked payment {} of {} on {}", self.id, id, amount, date);
        Ok(id)
    }

    /// Reopen (part of) what the payment with `external_id` settled.
    /// The chargeback is booked on the business date.
    pub fn chargeback(
        &mut self,
        engine: &ReplayEngine,
        external_id: &str,
        amount: Decimal,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        check_amount("transactionAmount", amount)?;
        let target = self
            .ledger
            .find_by_external_id(external_id)
            .ok_or_else(|| LoanError::ExternalIdNotFound(external_id.to_string()))?;
        if !target.kind().is_payment() {
            return Err(LoanError::NotChargeable {
                id: target.id(),
                kind: target.kind().label(),
            });
        }
        if target.is_reversed() {
            return Err(LoanError::TransactionReversed(target.id()));
        }
        let original = target.id();

        let mut ledger = self.ledger.clone();
        let id = ledger.append(
            TransactionKind::Chargeback { original },
            business_date,
            amount,
            None,
            business_date,
        );
        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;
        self.commit(ledger, self.charges.clone(), outcome);
        info!("loan {} charged back {} of payment {}", self.id, amount, original);
        Ok(id)
    }

    /// Re-age as of the business date.
    pub fn re_age(
        &mut self,
        engine: &ReplayEngine,
        request: &ReAgeRequest,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        let (id, ledger, outcome) = self.stage_re_age(engine, request, business_date)?;
        let amount = outcome.restated_amount(id).unwrap_or(Decimal::ZERO);
        self.commit(ledger, self.charges.clone(), outcome);
        info!(
            "loan {} re-aged {} into {} installments from {}",
            self.id, amount, request.number_of_installments, request.start_date
        );
        Ok(id)
    }

    /// The schedule [`Loan::re_age`] would produce, with nothing committed.
    pub fn preview_re_age(
        &self,
        engine: &ReplayEngine,
        request: &ReAgeRequest,
        business_date: NaiveDate,
    ) -> Result<ReAgePreview, LoanError> {
        let (id, _, outcome) = self.stage_re_age(engine, request, business_date)?;
        Ok(ReAgePreview {
            amount: outcome.restated_amount(id).unwrap_or(Decimal::ZERO),
            installments: outcome.schedule.views(),
            maturity_date: outcome.maturity_date,
        })
    }

    fn stage_re_age(
        &self,
        engine: &ReplayEngine,
        request: &ReAgeRequest,
        business_date: NaiveDate,
    ) -> Result<(TransactionId, TransactionLedger, ReplayOutcome), LoanError> {
        request.validate(business_date)?;
        match self.status {
            LoanStatus::Active => {}
            LoanStatus::Approved => return Err(LoanError::NotDisbursed),
            other => return Err(LoanError::InvalidStatus(other)),
        }

        let mut ledger = self.ledger.clone();
        let id = ledger.append(
            TransactionKind::ReAge(request.event()),
            business_date,
            Decimal::ZERO,
            request.external_id.clone(),
            business_date,
        );
        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;

        let calculated = outcome.restated_amount(id).unwrap_or(Decimal::ZERO);
        if calculated.is_zero() {
            return Err(LoanError::NothingToReAge);
        }
        if let Some(requested) = request.transaction_amount {
            if requested != calculated {
                return Err(LoanError::ReAgeAmountMismatch {
                    requested,
                    calculated,
                });
            }
        }
        Ok((id, ledger, outcome))
    }

    /// Reverse the active re-age and restore the plan it replaced.
    pub fn undo_re_age(
        &mut self,
        engine: &ReplayEngine,
        business_date: NaiveDate,
    ) -> Result<TransactionId, LoanError> {
        let target = self.ledger.active_re_age().ok_or(LoanError::NoActiveReAge)?;
        let (re_age, amount) = (target.id(), target.amount());

        let mut ledger = self.ledger.clone();
        ledger.reverse(re_age, business_date)?;
        let id = ledger.append(
            TransactionKind::UndoReAge { re_age },
            business_date,
            amount,
            None,
            business_date,
        );
        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;
        self.commit(ledger, self.charges.clone(), outcome);
        info!("loan {} undid re-age {}", self.id, re_age);
        Ok(id)
    }

    /// Flag a transaction reversed and replay everything after it.
    pub fn reverse(
        &mut self,
        engine: &ReplayEngine,
        id: TransactionId,
        reversal_date: NaiveDate,
        business_date: NaiveDate,
    ) -> Result<(), LoanError> {
        let target = self.ledger.get(id).ok_or(LoanError::TransactionNotFound(id))?;
        if target.is_reversed() {
            return Err(LoanError::AlreadyReversed(id));
        }
        match target.kind() {
            TransactionKind::Disbursement
            | TransactionKind::ReAge(_)
            | TransactionKind::UndoReAge { .. } => {
                return Err(LoanError::NotReversible {
                    id,
                    kind: target.kind().label(),
                });
            }
            _ => {}
        }
        if let Some(chargeback) = self.ledger.active_chargebacks(id).first() {
            return Err(LoanError::HasActiveChargeback {
                id,
                chargeback: chargeback.id(),
            });
        }
        if reversal_date < target.date() {
            return Err(LoanError::DateTooEarly {
                date: reversal_date,
                earliest: target.date(),
            });
        }
        ensure_not_future(reversal_date, business_date)?;
        let affected = target.date();

        let mut ledger = self.ledger.clone();
        ledger.reverse(id, reversal_date)?;
        debug!("loan {} replaying from {} after reversing {}", self.id, affected, id);
        let outcome = engine.replay(&self.terms, &self.charges, &ledger)?;
        self.commit(ledger, self.charges.clone(), outcome);
        info!("loan {} reversed transaction {}", self.id, id);
        Ok(())
    }

    /// Levy a fee or penalty due on `due_date`. Returns its sequence number.
    pub fn add_charge(
        &mut self,
        engine: &ReplayEngine,
        kind: ChargeKind,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Result<u64, LoanError> {
        check_amount("amount", amount)?;
        let first = self
            .ledger
            .first_disbursement_date()
            .ok_or(LoanError::NotDisbursed)?;
        if due_date < first {
            return Err(LoanError::DateTooEarly {
                date: due_date,
                earliest: first,
            });
        }

        let mut ledger = self.ledger.clone();
        let sequence = ledger.allocate_sequence();
        let mut charges = self.charges.clone();
        charges.push(LoanCharge::new(sequence, kind, amount, due_date));
        let outcome = engine.replay(&self.terms, &charges, &ledger)?;
        self.commit(ledger, charges, outcome);
        info!("loan {} charged {:?} {} due {}", self.id, kind, amount, due_date);
        Ok(sequence)
    }

    /// Replay the unchanged history, e.g. after switching allocation strategy.
    pub fn rebuild(&mut self, engine: &ReplayEngine) -> Result<(), LoanError> {
        let outcome = engine.replay(&self.terms, &self.charges, &self.ledger)?;
        self.commit(self.ledger.clone(), self.charges.clone(), outcome);
        Ok(())
    }

    fn commit(&mut self, mut ledger: TransactionLedger, charges: Vec<LoanCharge>, outcome: ReplayOutcome) {
        for (id, amount) in &outcome.restated {
            ledger.restate_amount(*id, *amount);
        }
        self.ledger = ledger;
        self.charges = charges;
        self.schedule = outcome.schedule;
        self.allocations = outcome.allocations;
        self.status = outcome.status;
        self.maturity_date = outcome.maturity_date;
        self.overpaid = outcome.overpaid;
        self.disbursed = outcome.disbursed;
        self.version += 1;
    }

    // --- Queries ---

    pub fn re_age_template(&self, business_date: NaiveDate) -> Result<ReAgeTemplate, LoanError> {
        re_age_template(self.schedule.installments(), business_date)
    }

    pub fn snapshot(&self) -> LoanSnapshot {
        LoanSnapshot {
            loan_id: self.id,
            version: self.version,
            currency: self.terms.currency.clone(),
            status: self.status,
            principal: self.terms.principal,
            disbursed: self.disbursed,
            overpaid: self.overpaid,
            total_outstanding: self.total_outstanding(),
            maturity_date: self.maturity_date,
            transactions: self.ledger.views(),
            installments: self.schedule.views(),
        }
    }
}

/// Version-stamped, serializable copy of a loan's read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanSnapshot {
    pub loan_id: LoanId,
    pub version: u64,
    pub currency: CurrencyCode,
    pub status: LoanStatus,
    pub principal: Decimal,
    pub disbursed: Decimal,
    pub overpaid: Decimal,
    pub total_outstanding: Decimal,
    pub maturity_date: Option<NaiveDate>,
    pub transactions: Vec<TransactionView>,
    pub installments: Vec<InstallmentView>,
}

impl fmt::Display for LoanSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Loan {} (v{}) ===", self.loan_id, self.version)?;
        writeln!(f, "Status:      {}", self.status)?;
        writeln!(f, "Disbursed:   {} {}", self.disbursed, self.currency)?;
        writeln!(f, "Outstanding: {} {}", self.total_outstanding, self.currency)?;
        if !self.overpaid.is_zero() {
            writeln!(f, "Overpaid:    {} {}", self.overpaid, self.currency)?;
        }
        match self.maturity_date {
            Some(date) => writeln!(f, "Maturity:    {}", date)?,
            None => writeln!(f, "Maturity:    -")?,
        }

        writeln!(f)?;
        writeln!(f, "--- Transactions ---")?;
        for tx in &self.transactions {
            let marker = if tx.reversed { " (reversed)" } else { "" };
            writeln!(f, "  #{:<3} {}  {:<12} {:>12}{}", tx.id, tx.date, tx.kind, tx.amount, marker)?;
        }

        writeln!(f)?;
        writeln!(f, "--- Installments ---")?;
        for inst in &self.installments {
            writeln!(
                f,
                "  {:>2}. {}  principal {:>10}  fee {:>8}  penalty {:>8}  outstanding {:>10}  {}",
                inst.position,
                inst.due_date,
                inst.principal_due,
                inst.fee_due,
                inst.penalty_due,
                inst.total_outstanding,
                if inst.obligations_met { "met" } else { "open" }
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use rust_decimal_macros::dec;

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

    fn disbursed_loan(engine: &ReplayEngine) -> Loan {
        let mut loan = Loan::new(LoanId::new(1), terms()).unwrap();
        loan.disburse(engine, dec!(1250), date(2023, 1, 1), date(2023, 1, 1))
            .unwrap();
        loan
    }

    #[test]
    fn test_disburse_books_auto_down_payment() {
        let engine = ReplayEngine::default();
        let loan = disbursed_loan(&engine);

        let kinds: Vec<&str> = loan.ledger().views().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec!["Disbursement", "Down Payment"]);
        assert_eq!(loan.ledger().entries()[1].amount(), dec!(312.5));
        assert_eq!(loan.status(), LoanStatus::Active);
        assert_eq!(loan.version(), 1);
    }

    #[test]
    fn test_failed_command_commits_nothing() {
        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        loan.repay(&engine, dec!(100), date(2023, 2, 1), Some("r-1".into()), date(2023, 2, 1))
            .unwrap();
        let before = loan.snapshot();

        let err = loan
            .chargeback(&engine, "r-1", dec!(150), date(2023, 2, 2))
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidChargebackAmount { .. }));
        assert_eq!(loan.snapshot(), before);
    }

    #[test]
    fn test_repay_validation() {
        let engine = ReplayEngine::default();
        let mut undisbursed = Loan::new(LoanId::new(2), terms()).unwrap();
        assert_eq!(
            undisbursed
                .repay(&engine, dec!(10), date(2023, 1, 1), None, date(2023, 1, 1))
                .unwrap_err(),
            LoanError::NotDisbursed
        );

        let mut loan = disbursed_loan(&engine);
        let zero = loan
            .repay(&engine, Decimal::ZERO, date(2023, 1, 2), None, date(2023, 1, 2))
            .unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::Validation);

        let future = loan
            .repay(&engine, dec!(10), date(2023, 1, 5), None, date(2023, 1, 2))
            .unwrap_err();
        assert!(matches!(future, LoanError::DateInFuture { .. }));

        let early = loan
            .repay(&engine, dec!(10), date(2022, 12, 31), None, date(2023, 1, 2))
            .unwrap_err();
        assert!(matches!(early, LoanError::DateTooEarly { .. }));
    }

    #[test]
    fn test_oversized_and_sub_cent_amounts_are_rejected() {
        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        loan.repay(&engine, dec!(100), date(2023, 2, 1), Some("r-1".into()), date(2023, 2, 1))
            .unwrap();
        let before = loan.snapshot();

        let huge = loan
            .disburse(&engine, Decimal::MAX, date(2023, 2, 1), date(2023, 2, 1))
            .unwrap_err();
        assert!(matches!(huge, LoanError::AmountTooLarge { .. }));
        assert_eq!(huge.kind(), ErrorKind::Validation);

        let sub_cent = loan
            .repay(&engine, dec!(100.005), date(2023, 2, 1), None, date(2023, 2, 1))
            .unwrap_err();
        assert!(matches!(sub_cent, LoanError::TooManyDecimals { .. }));
        assert_eq!(sub_cent.code(), "validation.msg.loan.transactionAmount.scale.exceeded");

        assert!(matches!(
            loan.chargeback(&engine, "r-1", dec!(0.001), date(2023, 2, 2)),
            Err(LoanError::TooManyDecimals { .. })
        ));
        assert!(matches!(
            loan.add_charge(&engine, ChargeKind::Fee, Decimal::MAX, date(2023, 3, 1)),
            Err(LoanError::AmountTooLarge { .. })
        ));
        assert_eq!(loan.snapshot(), before);

        // Trailing zeros are still whole cents.
        loan.repay(&engine, dec!(10.500), date(2023, 2, 1), None, date(2023, 2, 1))
            .unwrap();
        assert_eq!(loan.total_outstanding(), dec!(827));
    }

    #[test]
    fn test_chargeback_shrinks_allocation() {
        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        let repayment = loan
            .repay(&engine, dec!(100), date(2023, 2, 1), Some("r-1".into()), date(2023, 2, 1))
            .unwrap();
        assert_eq!(loan.allocation_of(repayment).unwrap().total(), dec!(100));

        loan.chargeback(&engine, "r-1", dec!(40), date(2023, 2, 5)).unwrap();
        assert_eq!(loan.allocation_of(repayment).unwrap().total(), dec!(60));
        assert_eq!(loan.schedule().installments()[1].outstanding(), dec!(252.5));
    }

    #[test]
    fn test_rebuild_with_another_strategy() {
        use crate::engine::allocation::DueOrderByComponent;
        use std::sync::Arc;

        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        // Due 5 Feb, so it lands on the March installment.
        loan.add_charge(&engine, ChargeKind::Fee, dec!(20), date(2023, 2, 5)).unwrap();
        loan.repay(&engine, dec!(50), date(2023, 2, 10), None, date(2023, 2, 10))
            .unwrap();
        // Oldest due first settles February principal before March's fee.
        assert_eq!(loan.schedule().installments()[2].fee.paid, Decimal::ZERO);

        let by_component = ReplayEngine::new(Arc::new(DueOrderByComponent::new()));
        let version = loan.version();
        loan.rebuild(&by_component).unwrap();
        assert_eq!(loan.schedule().installments()[2].fee.paid, dec!(20));
        assert_eq!(loan.total_outstanding(), dec!(907.5));
        assert_eq!(loan.version(), version + 1);
    }

    #[test]
    fn test_reverse_rules() {
        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        let disbursement = loan.ledger().entries()[0].id();
        assert!(matches!(
            loan.reverse(&engine, disbursement, date(2023, 1, 2), date(2023, 1, 2)),
            Err(LoanError::NotReversible { .. })
        ));

        let repayment = loan
            .repay(&engine, dec!(50), date(2023, 1, 10), Some("r-1".into()), date(2023, 1, 10))
            .unwrap();
        loan.chargeback(&engine, "r-1", dec!(50), date(2023, 1, 11)).unwrap();
        assert!(matches!(
            loan.reverse(&engine, repayment, date(2023, 1, 12), date(2023, 1, 12)),
            Err(LoanError::HasActiveChargeback { .. })
        ));
    }

    #[test]
    fn test_reversal_restores_prior_schedule() {
        let engine = ReplayEngine::default();
        let mut loan = disbursed_loan(&engine);
        let before = loan.schedule().clone();

        let id = loan
            .repay(&engine, dec!(100), date(2023, 2, 1), None, date(2023, 2, 1))
            .unwrap();
        loan.reverse(&engine, id, date(2023, 2, 2), date(2023, 2, 2)).unwrap();
        assert_eq!(loan.schedule(), &before);
        assert_eq!(
            loan.reverse(&engine, id, date(2023, 2, 3), date(2023, 2, 3)).unwrap_err(),
            LoanError::AlreadyReversed(id)
        );
    }

    #[test]
    fn test_re_age_requires_active_loan() {
        let engine = ReplayEngine::default();
        let loan = Loan::new(LoanId::new(3), terms()).unwrap();
        let request = ReAgeRequest::new(Frequency::monthly(), 2, date(2023, 2, 1));
        assert_eq!(
            loan.preview_re_age(&engine, &request, date(2023, 1, 15)).unwrap_err(),
            LoanError::NotDisbursed
        );
    }

    #[test]
    fn test_preview_does_not_commit() {
        let engine = ReplayEngine::default();
        let loan = disbursed_loan(&engine);
        let request = ReAgeRequest::new(Frequency::monthly(), 4, date(2023, 4, 12));

        let preview = loan.preview_re_age(&engine, &request, date(2023, 4, 12)).unwrap();
        assert_eq!(preview.amount, dec!(937.5));
        assert_eq!(preview.maturity_date, Some(date(2023, 7, 12)));
        assert_eq!(loan.maturity_date(), Some(date(2023, 4, 1)));
        assert_eq!(loan.ledger().len(), 2);
    }

    #[test]
    fn test_terms_validation() {
        let mut bad = terms();
        bad.number_of_installments = 0;
        assert!(Loan::new(LoanId::new(4), bad).is_err());

        let mut too_many = terms();
        too_many.number_of_installments = MAX_INSTALLMENTS + 1;
        assert!(matches!(
            too_many.validate(),
            Err(LoanError::InvalidParameter { field: "numberOfRepayments", .. })
        ));

        let mut huge = terms();
        huge.principal = Decimal::MAX;
        assert!(matches!(huge.validate(), Err(LoanError::AmountTooLarge { .. })));

        let mut usurious = terms();
        usurious.interest_rate_per_period = dec!(1.5);
        assert!(usurious.validate().is_err());

        let mut bad_dp = terms();
        bad_dp.down_payment = Some(DownPaymentTerms {
            percentage: dec!(120),
            auto_repayment: false,
        });
        assert!(bad_dp.validate().is_err());
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(LoanStatus::derive(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO), LoanStatus::Approved);
        assert_eq!(LoanStatus::derive(dec!(10), dec!(1), Decimal::ZERO), LoanStatus::Overpaid);
        assert_eq!(LoanStatus::derive(dec!(10), Decimal::ZERO, Decimal::ZERO), LoanStatus::ClosedObligationsMet);
        assert_eq!(LoanStatus::derive(dec!(10), Decimal::ZERO, dec!(5)), LoanStatus::Active);
        assert_eq!(LoanStatus::derive(dec!(10), dec!(1), dec!(5)), LoanStatus::Active);
    }
}
