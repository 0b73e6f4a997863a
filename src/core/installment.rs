use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four balance components an installment tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Principal,
    Interest,
    Fee,
    Penalty,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentKind::Principal => "principal",
            ComponentKind::Interest => "interest",
            ComponentKind::Fee => "fee",
            ComponentKind::Penalty => "penalty",
        };
        f.write_str(label)
    }
}

/// Due, paid and waived amounts of one component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub due: Decimal,
    pub paid: Decimal,
    pub waived: Decimal,
}

impl Component {
    pub fn due(amount: Decimal) -> Self {
        Self {
            due: amount,
            ..Self::default()
        }
    }

    pub fn outstanding(&self) -> Decimal {
        self.due - self.paid - self.waived
    }

    /// Reduce the amount due to what has already been settled, returning the
    /// part that was dropped.
    pub fn settle_at_paid(&mut self) -> Decimal {
        let dropped = self.outstanding();
        self.due -= dropped;
        dropped
    }
}

/// Why an installment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentKind {
    /// Down payment taken on a disbursement date.
    DownPayment,
    /// Generated by the original amortization plan.
    Regular,
    /// Generated by a re-age.
    ReAged,
    /// Opened for a charge falling after the last planned installment.
    Additional,
}

/// A single dated obligation of a loan.
///
/// The outstanding balance is always derived from the components and never
/// stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    number: u32,
    kind: InstallmentKind,
    due_date: NaiveDate,
    pub principal: Component,
    pub interest: Component,
    pub fee: Component,
    pub penalty: Component,
    obligations_met_on: Option<NaiveDate>,
    superseded_on: Option<NaiveDate>,
}

impl Installment {
    pub fn new(number: u32, kind: InstallmentKind, due_date: NaiveDate) -> Self {
        Self {
            number,
            kind,
            due_date,
            principal: Component::default(),
            interest: Component::default(),
            fee: Component::default(),
            penalty: Component::default(),
            obligations_met_on: None,
            superseded_on: None,
        }
    }

    pub fn with_principal(mut self, amount: Decimal) -> Self {
        self.principal = Component::due(amount);
        self
    }

    pub fn with_interest(mut self, amount: Decimal) -> Self {
        self.interest = Component::due(amount);
        self
    }

    // --- Accessors ---

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn kind(&self) -> InstallmentKind {
        self.kind
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn obligations_met_on(&self) -> Option<NaiveDate> {
        self.obligations_met_on
    }

    pub fn is_obligations_met(&self) -> bool {
        self.obligations_met_on.is_some()
    }

    pub fn superseded_on(&self) -> Option<NaiveDate> {
        self.superseded_on
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_on.is_some()
    }

    pub fn component(&self, kind: ComponentKind) -> &Component {
        match kind {
            ComponentKind::Principal => &self.principal,
            ComponentKind::Interest => &self.interest,
            ComponentKind::Fee => &self.fee,
            ComponentKind::Penalty => &self.penalty,
        }
    }

    pub fn component_mut(&mut self, kind: ComponentKind) -> &mut Component {
        match kind {
            ComponentKind::Principal => &mut self.principal,
            ComponentKind::Interest => &mut self.interest,
            ComponentKind::Fee => &mut self.fee,
            ComponentKind::Penalty => &mut self.penalty,
        }
    }

    fn components(&self) -> [&Component; 4] {
        [&self.principal, &self.interest, &self.fee, &self.penalty]
    }

    pub fn total_due(&self) -> Decimal {
        self.components().iter().map(|c| c.due).sum()
    }

    pub fn total_paid(&self) -> Decimal {
        self.components().iter().map(|c| c.paid).sum()
    }

    pub fn total_waived(&self) -> Decimal {
        self.components().iter().map(|c| c.waived).sum()
    }

    /// `Σ due − Σ (paid + waived)` across all components.
    pub fn outstanding(&self) -> Decimal {
        self.components().iter().map(|c| c.outstanding()).sum()
    }

    pub(crate) fn mark_superseded(&mut self, on: NaiveDate) {
        self.superseded_on = Some(on);
    }

    /// Keep `obligations_met_on` consistent with the balance after an event
    /// booked on `date`.
    pub(crate) fn settle_status(&mut self, date: NaiveDate) {
        if self.outstanding() > Decimal::ZERO {
            self.obligations_met_on = None;
        } else if self.obligations_met_on.is_none() {
            self.obligations_met_on = Some(date);
        }
    }

    /// Read model exposed to callers.
    pub fn view(&self, position: usize) -> InstallmentView {
        InstallmentView {
            position,
            number: self.number,
            kind: self.kind,
            due_date: self.due_date,
            principal_due: self.principal.due,
            principal_paid: self.principal.paid,
            principal_waived: self.principal.waived,
            principal_outstanding: self.principal.outstanding(),
            interest_due: self.interest.due,
            interest_paid: self.interest.paid,
            interest_waived: self.interest.waived,
            interest_outstanding: self.interest.outstanding(),
            fee_due: self.fee.due,
            fee_paid: self.fee.paid,
            fee_outstanding: self.fee.outstanding(),
            penalty_due: self.penalty.due,
            penalty_paid: self.penalty.paid,
            penalty_outstanding: self.penalty.outstanding(),
            total_outstanding: self.outstanding(),
            obligations_met: self.is_obligations_met(),
            obligations_met_on: self.obligations_met_on,
        }
    }
}

/// Flat, serializable row of the installment schedule read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentView {
    /// 1-based position in due-date order.
    pub position: usize,
    pub number: u32,
    pub kind: InstallmentKind,
    pub due_date: NaiveDate,
    pub principal_due: Decimal,
    pub principal_paid: Decimal,
    pub principal_waived: Decimal,
    pub principal_outstanding: Decimal,
    pub interest_due: Decimal,
    pub interest_paid: Decimal,
    pub interest_waived: Decimal,
    pub interest_outstanding: Decimal,
    pub fee_due: Decimal,
    pub fee_paid: Decimal,
    pub fee_outstanding: Decimal,
    pub penalty_due: Decimal,
    pub penalty_paid: Decimal,
    pub penalty_outstanding: Decimal,
    pub total_outstanding: Decimal,
    pub obligations_met: bool,
    pub obligations_met_on: Option<NaiveDate>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Installment store of one loan, ordered by `(due_date, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    installments: Vec<Installment>,
    next_number: u32,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            installments: Vec::new(),
            next_number: 1,
        }
    }

    /// Create and insert an installment, keeping the store ordered.
    /// Returns the new installment's number.
    pub fn open(
        &mut self,
        kind: InstallmentKind,
        due_date: NaiveDate,
        principal: Decimal,
        interest: Decimal,
    ) -> u32 {
        let number = self.next_number;
        self.next_number += 1;
        let installment = Installment::new(number, kind, due_date)
            .with_principal(principal)
            .with_interest(interest);
        let at = self
            .installments
            .partition_point(|i| (i.due_date, i.number) <= (due_date, number));
        self.installments.insert(at, installment);
        number
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Installment> {
        self.installments.iter_mut()
    }

    pub fn get(&self, number: u32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.number == number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.number == number)
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    pub fn total_outstanding(&self) -> Decimal {
        self.installments.iter().map(Installment::outstanding).sum()
    }

    pub fn principal_outstanding(&self) -> Decimal {
        self.installments
            .iter()
            .map(|i| i.principal.outstanding())
            .sum()
    }

    /// Due date of the last planned installment. Additional installments
    /// opened for late charges do not extend maturity.
    pub fn maturity_date(&self) -> Option<NaiveDate> {
        self.installments
            .iter()
            .filter(|i| i.kind != InstallmentKind::Additional)
            .map(|i| i.due_date)
            .max()
    }

    pub(crate) fn settle_statuses(&mut self, date: NaiveDate) {
        for installment in &mut self.installments {
            installment.settle_status(date);
        }
    }

    pub fn views(&self) -> Vec<InstallmentView> {
        self.installments
            .iter()
            .enumerate()
            .map(|(idx, i)| i.view(idx + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_outstanding_is_derived() {
        let mut inst = Installment::new(1, InstallmentKind::Regular, date(2023, 2, 1))
            .with_principal(dec!(312.5))
            .with_interest(dec!(10));
        inst.fee = Component::due(dec!(5));
        inst.principal.paid = dec!(100);
        inst.interest.waived = dec!(10);

        assert_eq!(inst.total_due(), dec!(327.5));
        assert_eq!(inst.outstanding(), dec!(217.5));
        assert_eq!(
            inst.outstanding(),
            inst.total_due() - inst.total_paid() - inst.total_waived()
        );
    }

    #[test]
    fn test_settle_at_paid() {
        let mut c = Component::due(dec!(312.5));
        c.paid = dec!(100);
        assert_eq!(c.settle_at_paid(), dec!(212.5));
        assert_eq!(c.due, dec!(100));
        assert_eq!(c.outstanding(), Decimal::ZERO);
    }

    #[test]
    fn test_schedule_orders_by_due_date_then_number() {
        let mut schedule = Schedule::new();
        let feb = schedule.open(InstallmentKind::Regular, date(2023, 2, 1), dec!(10), Decimal::ZERO);
        let jan = schedule.open(InstallmentKind::DownPayment, date(2023, 1, 1), dec!(5), Decimal::ZERO);
        let feb_again = schedule.open(InstallmentKind::Additional, date(2023, 2, 1), Decimal::ZERO, Decimal::ZERO);

        let numbers: Vec<u32> = schedule.installments().iter().map(|i| i.number()).collect();
        assert_eq!(numbers, vec![jan, feb, feb_again]);
    }

    #[test]
    fn test_maturity_ignores_additional() {
        let mut schedule = Schedule::new();
        schedule.open(InstallmentKind::Regular, date(2023, 4, 1), dec!(10), Decimal::ZERO);
        schedule.open(InstallmentKind::Additional, date(2023, 4, 11), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(schedule.maturity_date(), Some(date(2023, 4, 1)));
    }

    #[test]
    fn test_settle_status_sets_and_clears() {
        let mut inst = Installment::new(1, InstallmentKind::Regular, date(2023, 2, 1))
            .with_principal(dec!(50));
        inst.settle_status(date(2023, 1, 15));
        assert!(!inst.is_obligations_met());

        inst.principal.paid = dec!(50);
        inst.settle_status(date(2023, 1, 20));
        assert_eq!(inst.obligations_met_on(), Some(date(2023, 1, 20)));

        // A later event does not move the date while it stays settled
        inst.settle_status(date(2023, 1, 25));
        assert_eq!(inst.obligations_met_on(), Some(date(2023, 1, 20)));

        inst.principal.paid = dec!(20);
        inst.settle_status(date(2023, 1, 30));
        assert!(!inst.is_obligations_met());
    }

    #[test]
    fn test_views_are_positioned() {
        let mut schedule = Schedule::new();
        schedule.open(InstallmentKind::Regular, date(2023, 3, 1), dec!(10), Decimal::ZERO);
        schedule.open(InstallmentKind::Regular, date(2023, 2, 1), dec!(20), Decimal::ZERO);
        let views = schedule.views();
        assert_eq!(views[0].position, 1);
        assert_eq!(views[0].due_date, date(2023, 2, 1));
        assert_eq!(views[1].principal_outstanding, dec!(10));
    }
}
