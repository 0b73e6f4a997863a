//! Random loan histories for soak runs and benchmarks.
//!
//! Histories are generated from a seed so a failing run can be replayed
//! exactly. Every generated step is one the ledger accepts: repayments stay
//! below the outstanding balance, each repayment is either reversed or
//! charged back but never both, and follow-ups land after the payment they
//! target.

use crate::config::{EngineConfig, LoanProduct, ProductOverrides};
use crate::core::frequency::{one_month_after, Frequency};
use crate::core::money::round_money;
use crate::engine::reage::InterestHandlingType;
use crate::simulation::script::{Scenario, ScenarioStep, StepAction};
use chrono::{Days, NaiveDate};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use uuid::Builder;

/// Shape of a generated history.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub seed: u64,
    pub product: LoanProduct,
    pub principal: Decimal,
    /// Disbursement date and first business date.
    pub start: NaiveDate,
    pub repayments: usize,
    /// Largest single repayment, in minor units.
    pub max_repayment_cents: i64,
    /// Chance that a repayment is later reversed.
    pub reversal_probability: f64,
    /// Chance that a repayment that is not reversed gets a partial chargeback.
    pub chargeback_probability: f64,
    pub re_age: bool,
    pub undo_re_age: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            product: LoanProduct::default(),
            principal: Decimal::from(10_000),
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            repayments: 12,
            max_repayment_cents: 40_000,
            reversal_probability: 0.2,
            chargeback_probability: 0.2,
            re_age: true,
            undo_re_age: false,
        }
    }
}

fn days_after(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// Generate a seeded history for one loan.
pub fn generate_random_history(config: &HistoryConfig) -> Scenario {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut steps = Vec::with_capacity(config.repayments * 2 + 3);

    steps.push(ScenarioStep::new(
        config.start,
        StepAction::Disburse {
            amount: config.principal,
            date: None,
        },
    ));

    let mut on = config.start;
    for _ in 0..config.repayments {
        on = days_after(on, rng.gen_range(3..=10));
        // Backdated up to a few days, never before the disbursement.
        let backdate = rng.gen_range(0..=3);
        let date = on
            .checked_sub_days(Days::new(backdate))
            .filter(|d| *d >= config.start)
            .unwrap_or(config.start);
        let cents = rng.gen_range(1_000..=config.max_repayment_cents.max(1_000));
        let amount = Decimal::new(cents, 2);
        let external_id = Builder::from_random_bytes(rng.gen()).into_uuid().to_string();

        steps.push(ScenarioStep::new(
            on,
            StepAction::Repay {
                amount,
                date: Some(date),
                external_id: Some(external_id.clone()),
            },
        ));

        let follow_up = days_after(on, 1);
        if rng.gen_bool(config.reversal_probability) {
            steps.push(ScenarioStep::new(
                follow_up,
                StepAction::Reverse {
                    transaction: None,
                    external_id: Some(external_id),
                    reversal_date: None,
                },
            ));
            on = follow_up;
        } else if rng.gen_bool(config.chargeback_probability) {
            steps.push(ScenarioStep::new(
                follow_up,
                StepAction::Chargeback {
                    external_id,
                    amount: round_money(amount / Decimal::from(2)),
                },
            ));
            on = follow_up;
        }
    }

    if config.re_age {
        on = days_after(on, 1);
        let start_date = one_month_after(on).unwrap_or(on);
        steps.push(ScenarioStep::new(
            on,
            StepAction::ReAge {
                frequency: Frequency::monthly(),
                number_of_installments: rng.gen_range(3..=12),
                start_date,
                interest_handling: InterestHandlingType::Default,
                transaction_amount: None,
            },
        ));
        if config.undo_re_age {
            steps.push(ScenarioStep::new(days_after(on, 1), StepAction::UndoReAge));
        }
    }

    debug!(
        "generated history with {} steps from seed {}",
        steps.len(),
        config.seed
    );

    Scenario {
        product: config.product.clone(),
        overrides: ProductOverrides::default(),
        engine: EngineConfig::default(),
        principal: config.principal,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loan::LoanStatus;
    use crate::simulation::script::run_scenario;

    #[test]
    fn test_same_seed_same_history() {
        let config = HistoryConfig::default();
        assert_eq!(generate_random_history(&config), generate_random_history(&config));

        let other = HistoryConfig {
            seed: 8,
            ..HistoryConfig::default()
        };
        assert_ne!(generate_random_history(&config), generate_random_history(&other));
    }

    #[test]
    fn test_generated_history_is_accepted() {
        for seed in 0..20 {
            let config = HistoryConfig {
                seed,
                undo_re_age: seed % 2 == 0,
                ..HistoryConfig::default()
            };
            let report = run_scenario(&generate_random_history(&config)).unwrap();
            assert_eq!(report.snapshot.status, LoanStatus::Active);
            assert!(report.rejected.is_empty());
            assert!(report.snapshot.total_outstanding > Decimal::ZERO);
        }
    }

    #[test]
    fn test_step_dates_never_go_backwards() {
        let scenario = generate_random_history(&HistoryConfig {
            repayments: 50,
            ..HistoryConfig::default()
        });
        assert!(scenario.steps.windows(2).all(|w| w[0].on <= w[1].on));
    }
}
