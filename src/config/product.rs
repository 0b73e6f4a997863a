use crate::core::error::LoanError;
use crate::core::frequency::Frequency;
use crate::core::loan::{DownPaymentTerms, LoanTerms};
use crate::core::money::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Template loans are created from.
///
/// Products are never mutated. A variant is derived with
/// [`LoanProduct::with_overrides`], which returns a new record and leaves
/// the base untouched.
///
/// # Examples
///
/// ```
/// use loan_replay::config::{LoanProduct, ProductOverrides};
/// use rust_decimal_macros::dec;
///
/// let base = LoanProduct::default();
/// let variant = base.with_overrides(&ProductOverrides {
///     number_of_installments: Some(6),
///     ..Default::default()
/// });
///
/// assert_eq!(variant.number_of_installments, 6);
/// assert_eq!(base.number_of_installments, 3);
/// assert_eq!(variant.terms_for(dec!(1000)).unwrap().principal, dec!(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub name: String,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub down_payment: Option<DownPaymentTerms>,
    pub repayment_frequency: Frequency,
    pub number_of_installments: u32,
    #[serde(default)]
    pub interest_rate_per_period: Decimal,
}

impl Default for LoanProduct {
    /// Three monthly installments after a 25% automatic down payment, no
    /// interest.
    fn default() -> Self {
        Self {
            name: "down-payment-monthly".to_string(),
            currency: CurrencyCode::default(),
            down_payment: Some(DownPaymentTerms {
                percentage: Decimal::from(25),
                auto_repayment: true,
            }),
            repayment_frequency: Frequency::monthly(),
            number_of_installments: 3,
            interest_rate_per_period: Decimal::ZERO,
        }
    }
}

/// Partial product; every field that is `Some` replaces the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOverrides {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// `Some(None)` removes the down payment.
    #[serde(default)]
    pub down_payment: Option<Option<DownPaymentTerms>>,
    #[serde(default)]
    pub repayment_frequency: Option<Frequency>,
    #[serde(default)]
    pub number_of_installments: Option<u32>,
    #[serde(default)]
    pub interest_rate_per_period: Option<Decimal>,
}

impl LoanProduct {
    pub fn with_overrides(&self, overrides: &ProductOverrides) -> LoanProduct {
        LoanProduct {
            name: overrides.name.clone().unwrap_or_else(|| self.name.clone()),
            currency: overrides
                .currency
                .clone()
                .unwrap_or_else(|| self.currency.clone()),
            down_payment: overrides.down_payment.unwrap_or(self.down_payment),
            repayment_frequency: overrides
                .repayment_frequency
                .unwrap_or(self.repayment_frequency),
            number_of_installments: overrides
                .number_of_installments
                .unwrap_or(self.number_of_installments),
            interest_rate_per_period: overrides
                .interest_rate_per_period
                .unwrap_or(self.interest_rate_per_period),
        }
    }

    /// Terms of a loan of `principal` under this product.
    pub fn terms_for(&self, principal: Decimal) -> Result<LoanTerms, LoanError> {
        let terms = LoanTerms {
            currency: self.currency.clone(),
            principal,
            down_payment: self.down_payment,
            repayment_frequency: self.repayment_frequency,
            number_of_installments: self.number_of_installments,
            interest_rate_per_period: self.interest_rate_per_period,
        };
        terms.validate()?;
        Ok(terms)
    }
}
