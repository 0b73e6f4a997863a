//! Payment allocation strategies.
//!
//! A strategy decides which installment components a payment settles and in
//! what order. The replay engine records the resulting [`Allocation`] per
//! payment so a later chargeback can reopen exactly what the payment paid.

use crate::core::installment::{ComponentKind, Schedule};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Component order used when none is configured.
pub const DEFAULT_COMPONENT_ORDER: [ComponentKind; 4] = [
    ComponentKind::Penalty,
    ComponentKind::Fee,
    ComponentKind::Interest,
    ComponentKind::Principal,
];

/// A slice of a payment applied to one component of one installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPortion {
    pub installment: u32,
    pub component: ComponentKind,
    pub amount: Decimal,
}

/// Where a payment went, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub portions: Vec<AllocationPortion>,
    /// Part of the payment no installment needed; becomes overpaid credit.
    pub unallocated: Decimal,
}

impl Allocation {
    /// Total still attributed to the payment.
    pub fn total(&self) -> Decimal {
        self.portions.iter().map(|p| p.amount).sum::<Decimal>() + self.unallocated
    }

    fn push(&mut self, installment: u32, component: ComponentKind, amount: Decimal) {
        self.portions.push(AllocationPortion {
            installment,
            component,
            amount,
        });
    }
}

/// Distributes a payment over the outstanding components of a schedule.
///
/// Implementations must only increase `paid` amounts, never beyond a
/// component's outstanding balance, and must report everything they did not
/// place as `unallocated`.
pub trait AllocationStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn allocate(&self, schedule: &mut Schedule, amount: Decimal) -> Allocation;
}

fn validated_order(order: Vec<ComponentKind>) -> Vec<ComponentKind> {
    let complete = order.len() == DEFAULT_COMPONENT_ORDER.len()
        && DEFAULT_COMPONENT_ORDER.iter().all(|k| order.contains(k));
    if complete {
        order
    } else {
        DEFAULT_COMPONENT_ORDER.to_vec()
    }
}

/// Settle installments one at a time, oldest due date first; inside an
/// installment, follow the component order.
#[derive(Debug, Clone)]
pub struct OldestDueFirst {
    order: Vec<ComponentKind>,
}

impl OldestDueFirst {
    pub fn new() -> Self {
        Self {
            order: DEFAULT_COMPONENT_ORDER.to_vec(),
        }
    }

    /// Use a custom component order. An order that does not name each
    /// component exactly once falls back to the default.
    pub fn with_order(order: Vec<ComponentKind>) -> Self {
        Self {
            order: validated_order(order),
        }
    }

    pub fn order(&self) -> &[ComponentKind] {
        &self.order
    }
}

impl Default for OldestDueFirst {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationStrategy for OldestDueFirst {
    fn name(&self) -> &'static str {
        "oldest-due-first"
    }

    fn allocate(&self, schedule: &mut Schedule, amount: Decimal) -> Allocation {
        let mut allocation = Allocation::default();
        let mut remaining = amount;

        'installments: for installment in schedule.iter_mut() {
            for &kind in &self.order {
                if remaining <= Decimal::ZERO {
                    break 'installments;
                }
                let component = installment.component_mut(kind);
                let take = component.outstanding().min(remaining);
                if take > Decimal::ZERO {
                    component.paid += take;
                    remaining -= take;
                    allocation.push(installment.number(), kind, take);
                }
            }
        }

        allocation.unallocated = remaining;
        allocation
    }
}

/// Settle one component across every installment before moving on to the
/// next component.
#[derive(Debug, Clone)]
pub struct DueOrderByComponent {
    order: Vec<ComponentKind>,
}

impl DueOrderByComponent {
    pub fn new() -> Self {
        Self {
            order: DEFAULT_COMPONENT_ORDER.to_vec(),
        }
    }

    pub fn with_order(order: Vec<ComponentKind>) -> Self {
        Self {
            order: validated_order(order),
        }
    }
}

impl Default for DueOrderByComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationStrategy for DueOrderByComponent {
    fn name(&self) -> &'static str {
        "due-order-by-component"
    }

    fn allocate(&self, schedule: &mut Schedule, amount: Decimal) -> Allocation {
        let mut allocation = Allocation::default();
        let mut remaining = amount;

        for &kind in &self.order {
            for installment in schedule.iter_mut() {
                if remaining <= Decimal::ZERO {
                    break;
                }
                let component = installment.component_mut(kind);
                let take = component.outstanding().min(remaining);
                if take > Decimal::ZERO {
                    component.paid += take;
                    remaining -= take;
                    allocation.push(installment.number(), kind, take);
                }
            }
        }

        allocation.unallocated = remaining;
        allocation
    }
}
