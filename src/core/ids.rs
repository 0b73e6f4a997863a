use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a loan inside a [`LoanBook`](crate::service::LoanBook).
///
/// # Examples
///
/// ```
/// use loan_replay::core::ids::LoanId;
///
/// let a = LoanId::new(1);
/// let b = LoanId::new(2);
/// assert_ne!(a, b);
/// assert_eq!(a.to_string(), "1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(u64);

impl LoanId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LoanId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Identifier of a ledger entry.
///
/// The value doubles as the entry's sequence number: it is handed out in
/// insertion order and breaks ties between entries booked on the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Position of this entry in insertion order.
    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TransactionId {
    fn from(sequence: u64) -> Self {
        Self::new(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_id_equality() {
        assert_eq!(LoanId::new(7), LoanId::from(7));
        assert_ne!(LoanId::new(7), LoanId::new(8));
    }

    #[test]
    fn test_transaction_id_orders_by_sequence() {
        let first = TransactionId::new(1);
        let second = TransactionId::new(2);
        assert!(first < second);
        assert_eq!(second.sequence(), 2);
    }

    #[test]
    fn test_transaction_id_display() {
        assert_eq!(format!("{}", TransactionId::new(42)), "42");
    }
}
