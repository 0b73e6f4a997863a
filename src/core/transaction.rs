use crate::core::error::LoanError;
use crate::core::frequency::Frequency;
use crate::core::ids::TransactionId;
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How outstanding interest is treated when a loan is re-aged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestHandlingType {
    /// Only principal is re-aged; interest stays on the original installments.
    #[default]
    Default,
    /// Outstanding interest on collapsed installments is waived.
    WaiveInterest,
    /// Interest due on or before the re-age date is re-aged with the
    /// principal; interest of later installments is dropped.
    EqualAmortizationPayableInterest,
    /// All outstanding interest is re-aged with the principal.
    EqualAmortizationFullInterest,
}

/// Parameters of a re-age, carried by its ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReAgeEvent {
    pub frequency: Frequency,
    pub number_of_installments: u32,
    pub start_date: NaiveDate,
    pub interest_handling: InterestHandlingType,
}

/// Typed payload of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Disbursement,
    DownPayment,
    Repayment,
    Chargeback { original: TransactionId },
    ReAge(ReAgeEvent),
    UndoReAge { re_age: TransactionId },
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Disbursement => "Disbursement",
            TransactionKind::DownPayment => "Down Payment",
            TransactionKind::Repayment => "Repayment",
            TransactionKind::Chargeback { .. } => "Chargeback",
            TransactionKind::ReAge(_) => "Re-age",
            TransactionKind::UndoReAge { .. } => "Undo Re-age",
        }
    }

    /// Whether the entry moves money towards the installments.
    pub fn is_payment(&self) -> bool {
        matches!(self, TransactionKind::DownPayment | TransactionKind::Repayment)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A dated entry of the loan ledger.
///
/// Entries are immutable once booked. The only later changes are the
/// reversal flag and, for re-ages, the amount restated by each replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    date: NaiveDate,
    amount: Decimal,
    external_id: Option<String>,
    submitted_on: NaiveDate,
    reversed: bool,
    reversal_date: Option<NaiveDate>,
}

impl Transaction {
    // --- Accessors ---

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn submitted_on(&self) -> NaiveDate {
        self.submitted_on
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn reversal_date(&self) -> Option<NaiveDate> {
        self.reversal_date
    }

    /// Replay ordering key: transaction date, then insertion sequence.
    pub fn replay_key(&self) -> (NaiveDate, u64) {
        (self.date, self.id.sequence())
    }

    pub fn view(&self) -> TransactionView {
        TransactionView {
            id: self.id,
            kind: self.kind.label(),
            date: self.date,
            amount: self.amount,
            external_id: self.external_id.clone(),
            submitted_on: self.submitted_on,
            reversed: self.reversed,
            reversal_date: self.reversal_date,
        }
    }
}

/// Serializable row of the transaction read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub kind: &'static str,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub external_id: Option<String>,
    /// Business date the entry was booked on; later than `date` when backdated.
    pub submitted_on: NaiveDate,
    pub reversed: bool,
    pub reversal_date: Option<NaiveDate>,
}

/// Append-only ledger of a single loan.
///
/// Entries keep their insertion order; the replay engine applies them in
/// `(date, sequence)` order via [`TransactionLedger::replay_order`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use loan_replay::core::transaction::{TransactionKind, TransactionLedger};
/// use rust_decimal_macros::dec;
///
/// let jan = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let feb = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
///
/// let mut ledger = TransactionLedger::new();
/// ledger.append(TransactionKind::Repayment, feb, dec!(100), None, feb);
/// ledger.append(TransactionKind::Disbursement, jan, dec!(1000), None, feb);
///
/// let order: Vec<_> = ledger.replay_order().iter().map(|t| t.date()).collect();
/// assert_eq!(order, vec![jan, feb]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLedger {
    entries: Vec<Transaction>,
    next_sequence: u64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next sequence number without booking an entry.
    pub fn allocate_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Book an entry at the tail of the ledger.
    pub fn append(
        &mut self,
        kind: TransactionKind,
        date: NaiveDate,
        amount: Decimal,
        external_id: Option<String>,
        submitted_on: NaiveDate,
    ) -> TransactionId {
        let id = TransactionId::new(self.allocate_sequence());
        debug!("ledger append {} {} {} on {}", id, kind, amount, date);
        self.entries.push(Transaction {
            id,
            kind,
            date,
            amount,
            external_id,
            submitted_on,
            reversed: false,
            reversal_date: None,
        });
        id
    }

    /// Flag an entry as reversed. The entry stays in the ledger.
    pub fn reverse(
        &mut self,
        id: TransactionId,
        reversal_date: NaiveDate,
    ) -> Result<&Transaction, LoanError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LoanError::TransactionNotFound(id))?;
        if entry.reversed {
            return Err(LoanError::AlreadyReversed(id));
        }
        entry.reversed = true;
        entry.reversal_date = Some(reversal_date);
        debug!("ledger reverse {} on {}", id, reversal_date);
        Ok(entry)
    }

    /// Overwrite the amount of an entry whose amount is derived by replay.
    pub(crate) fn restate_amount(&mut self, id: TransactionId, amount: Decimal) {
        if let Some(entry) = self.entries.iter_mut().find(|t| t.id == id) {
            entry.amount = amount;
        }
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.entries.iter().find(|t| t.id == id)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Option<&Transaction> {
        self.entries
            .iter()
            .find(|t| t.external_id.as_deref() == Some(external_id))
    }

    /// All entries in insertion order, reversed ones included.
    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-reversed entries in `(date, sequence)` order.
    pub fn replay_order(&self) -> Vec<&Transaction> {
        let mut active: Vec<&Transaction> = self.entries.iter().filter(|t| !t.reversed).collect();
        active.sort_by_key(|t| t.replay_key());
        active
    }

    /// The latest non-reversed re-age in replay order.
    pub fn active_re_age(&self) -> Option<&Transaction> {
        self.entries
            .iter()
            .filter(|t| !t.reversed && matches!(t.kind, TransactionKind::ReAge(_)))
            .max_by_key(|t| t.replay_key())
    }

    /// Non-reversed chargebacks booked against `original`.
    pub fn active_chargebacks(&self, original: TransactionId) -> Vec<&Transaction> {
        self.entries
            .iter()
            .filter(|t| {
                !t.reversed
                    && matches!(t.kind, TransactionKind::Chargeback { original: o } if o == original)
            })
            .collect()
    }

    /// Date of the earliest non-reversed disbursement.
    pub fn first_disbursement_date(&self) -> Option<NaiveDate> {
        self.entries
            .iter()
            .filter(|t| !t.reversed && t.kind == TransactionKind::Disbursement)
            .map(|t| t.date)
            .min()
    }

    /// Sum of non-reversed disbursements.
    pub fn disbursed_total(&self) -> Decimal {
        self.entries
            .iter()
            .filter(|t| !t.reversed && t.kind == TransactionKind::Disbursement)
            .map(|t| t.amount)
            .sum()
    }

    /// Read model of every entry, reversed ones included, in
    /// `(date, sequence)` order.
    pub fn views(&self) -> Vec<TransactionView> {
        let mut all: Vec<&Transaction> = self.entries.iter().collect();
        all.sort_by_key(|t| t.replay_key());
        all.into_iter().map(Transaction::view).collect()
    }
}
