use crate::core::error::LoanError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places every booked amount is rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a single command may book: one trillion.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Upper bound on the installments of a plan or a re-age.
pub const MAX_INSTALLMENTS: u32 = 1200;

/// ISO 4217-style currency code of a loan.
///
/// A loan is denominated in exactly one currency; the engine never converts
/// between currencies.
///
/// # Examples
///
/// ```
/// use loan_replay::core::money::CurrencyCode;
///
/// let usd = CurrencyCode::new("USD");
/// let eur = CurrencyCode::new("EUR");
/// assert_ne!(usd, eur);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Round an amount to cents, half away from zero (234.375 -> 234.38).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `percentage` percent of `amount`, rounded to cents.
pub fn percentage_of(amount: Decimal, percentage: Decimal) -> Decimal {
    round_money(amount * percentage / Decimal::ONE_HUNDRED)
}

/// Check a caller-supplied amount: positive, at most [`MAX_AMOUNT`], and
/// expressible in cents.
pub fn check_amount(field: &'static str, amount: Decimal) -> Result<(), LoanError> {
    if amount <= Decimal::ZERO {
        return Err(LoanError::NonPositiveAmount { field, amount });
    }
    if amount > MAX_AMOUNT {
        return Err(LoanError::AmountTooLarge { field, amount });
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LoanError::TooManyDecimals { field, amount });
    }
    Ok(())
}

/// Split `total` into `parts` cent-rounded amounts.
///
/// Every part but the last is `total / parts` rounded half-up; the last part
/// absorbs the rounding remainder so the parts always sum to `total`.
/// When rounding up would overdraw the last part the per-part amount is
/// truncated instead.
///
/// # Examples
///
/// ```
/// use loan_replay::core::money::split_evenly;
/// use rust_decimal_macros::dec;
///
/// let parts = split_evenly(dec!(937.5), 4);
/// assert_eq!(parts, vec![dec!(234.38), dec!(234.38), dec!(234.38), dec!(234.36)]);
/// ```
pub fn split_evenly(total: Decimal, parts: u32) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let count = Decimal::from(parts);
    let head = Decimal::from(parts - 1);

    let mut each = round_money(total / count);
    if each * head > total {
        each = (total / count).round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    }

    let mut split = vec![each; parts as usize - 1];
    split.push(total - each * head);
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_code_equality() {
        let a = CurrencyCode::new("USD");
        let b = CurrencyCode::new("USD");
        assert_eq!(a, b);
        assert_eq!(CurrencyCode::default(), a);
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(234.375)), dec!(234.38));
        assert_eq!(round_money(dec!(279.165)), dec!(279.17));
        assert_eq!(round_money(dec!(8.333)), dec!(8.33));
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(dec!(1250), dec!(25)), dec!(312.50));
        assert_eq!(percentage_of(dec!(100), dec!(25)), dec!(25));
    }

    #[test]
    fn test_max_amount_is_one_trillion() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000000));
    }

    #[test]
    fn test_check_amount_limits() {
        assert!(check_amount("transactionAmount", dec!(100.50)).is_ok());
        assert!(check_amount("transactionAmount", dec!(100.500000)).is_ok());
        assert!(check_amount("transactionAmount", MAX_AMOUNT).is_ok());

        assert!(matches!(
            check_amount("transactionAmount", Decimal::ZERO),
            Err(LoanError::NonPositiveAmount { .. })
        ));
        assert!(matches!(
            check_amount("transactionAmount", Decimal::MAX),
            Err(LoanError::AmountTooLarge { .. })
        ));
        assert!(matches!(
            check_amount("transactionAmount", MAX_AMOUNT + dec!(0.01)),
            Err(LoanError::AmountTooLarge { .. })
        ));
        let sub_cent = check_amount("transactionAmount", dec!(100.005)).unwrap_err();
        assert_eq!(sub_cent.code(), "validation.msg.loan.transactionAmount.scale.exceeded");
    }

    #[test]
    fn test_split_remainder_on_last() {
        assert_eq!(
            split_evenly(dec!(837.5), 3),
            vec![dec!(279.17), dec!(279.17), dec!(279.16)]
        );
        assert_eq!(
            split_evenly(dec!(250), 6),
            vec![dec!(41.67), dec!(41.67), dec!(41.67), dec!(41.67), dec!(41.67), dec!(41.65)]
        );
        assert_eq!(
            split_evenly(dec!(50), 6),
            vec![dec!(8.33), dec!(8.33), dec!(8.33), dec!(8.33), dec!(8.33), dec!(8.35)]
        );
    }

    #[test]
    fn test_split_never_overdraws_last_part() {
        let parts = split_evenly(dec!(0.02), 4);
        assert_eq!(parts.iter().copied().sum::<Decimal>(), dec!(0.02));
        assert!(parts.iter().all(|p| *p >= Decimal::ZERO));
    }

    #[test]
    fn test_split_zero_parts() {
        assert!(split_evenly(dec!(100), 0).is_empty());
    }
}
