//! Scripted loan histories.
//!
//! A [`Scenario`] is a JSON document describing one loan and a dated list of
//! commands. [`run_scenario`] plays it through a [`LoanBook`] whose business
//! date is moved to each step's `on` date before the step runs.

use crate::config::{ConfigError, EngineConfig, LoanProduct, ProductOverrides};
use crate::core::error::LoanError;
use crate::core::frequency::Frequency;
use crate::core::ids::{LoanId, TransactionId};
use crate::core::loan::{ChargeKind, LoanSnapshot};
use crate::engine::reage::{InterestHandlingType, ReAgeRequest};
use crate::engine::template::ReAgeTemplate;
use crate::service::clock::ManualClock;
use crate::service::events::LoanEvent;
use crate::service::loan_book::LoanBook;
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One command of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Disburse {
        amount: Decimal,
        /// Defaults to the step date.
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    Repay {
        amount: Decimal,
        #[serde(default)]
        date: Option<NaiveDate>,
        #[serde(default)]
        external_id: Option<String>,
    },
    Chargeback {
        external_id: String,
        amount: Decimal,
    },
    AddCharge {
        kind: ChargeKind,
        amount: Decimal,
        #[serde(default)]
        due_date: Option<NaiveDate>,
    },
    ReAge {
        frequency: Frequency,
        number_of_installments: u32,
        start_date: NaiveDate,
        #[serde(default)]
        interest_handling: InterestHandlingType,
        #[serde(default)]
        transaction_amount: Option<Decimal>,
    },
    UndoReAge,
    /// Reverse by ledger id or by external id.
    Reverse {
        #[serde(default)]
        transaction: Option<u64>,
        #[serde(default)]
        external_id: Option<String>,
        #[serde(default)]
        reversal_date: Option<NaiveDate>,
    },
    Template,
}

impl StepAction {
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::Disburse { .. } => "disburse",
            StepAction::Repay { .. } => "repay",
            StepAction::Chargeback { .. } => "chargeback",
            StepAction::AddCharge { .. } => "add_charge",
            StepAction::ReAge { .. } => "re_age",
            StepAction::UndoReAge => "undo_re_age",
            StepAction::Reverse { .. } => "reverse",
            StepAction::Template => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Business date the step runs on.
    pub on: NaiveDate,
    #[serde(flatten)]
    pub action: StepAction,
    /// Error code the step is expected to be rejected with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<String>,
}

impl ScenarioStep {
    pub fn new(on: NaiveDate, action: StepAction) -> Self {
        Self {
            on,
            action,
            expect_error: None,
        }
    }

    pub fn expecting(mut self, code: impl Into<String>) -> Self {
        self.expect_error = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub product: LoanProduct,
    #[serde(default)]
    pub overrides: ProductOverrides,
    #[serde(default)]
    pub engine: EngineConfig,
    pub principal: Decimal,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error("scenario has no steps")]
    Empty,

    #[error("step {index} ({action}) failed: {source}")]
    Step {
        index: usize,
        action: &'static str,
        #[source]
        source: LoanError,
    },

    #[error("step {index} ({action}) succeeded but {expected} was expected")]
    UnexpectedSuccess {
        index: usize,
        action: &'static str,
        expected: String,
    },

    #[error("step {index} ({action}) failed with {actual} but {expected} was expected")]
    WrongError {
        index: usize,
        action: &'static str,
        expected: String,
        actual: &'static str,
    },

    #[error("step {index}: reverse needs a transaction id or an external id")]
    MissingTarget { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRecord {
    pub on: NaiveDate,
    pub template: ReAgeTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedStep {
    pub index: usize,
    pub action: &'static str,
    pub code: &'static str,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub product: String,
    pub snapshot: LoanSnapshot,
    pub templates: Vec<TemplateRecord>,
    pub rejected: Vec<RejectedStep>,
    pub events: Vec<LoanEvent>,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Product: {}", self.product)?;
        write!(f, "{}", self.snapshot)?;
        for record in &self.templates {
            writeln!(f)?;
            writeln!(f, "On {}:", record.on)?;
            write!(f, "{}", record.template)?;
        }
        if !self.rejected.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Rejected steps (expected) ---")?;
            for step in &self.rejected {
                writeln!(f, "  step {} {}: {}", step.index, step.action, step.code)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Events committed: {}", self.events.len())
    }
}

enum StepOutcome {
    Done,
    Template(ReAgeTemplate),
}

fn resolve_target(
    book: &LoanBook,
    loan: LoanId,
    index: usize,
    transaction: Option<u64>,
    external_id: Option<&str>,
) -> Result<Result<TransactionId, LoanError>, ScenarioError> {
    if let Some(sequence) = transaction {
        return Ok(Ok(TransactionId::new(sequence)));
    }
    let Some(external_id) = external_id else {
        return Err(ScenarioError::MissingTarget { index });
    };
    let found = book.transactions(loan).map(|views| {
        views
            .into_iter()
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .map(|t| t.id)
    });
    Ok(match found {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(LoanError::ExternalIdNotFound(external_id.to_string())),
        Err(err) => Err(err),
    })
}

/// Play a scenario from scratch and report the final loan state.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
    let first = scenario.steps.first().ok_or(ScenarioError::Empty)?;
    let product = scenario.product.with_overrides(&scenario.overrides);
    let engine = scenario.engine.build_engine()?;
    let clock = Arc::new(ManualClock::new(first.on));
    let book = LoanBook::with_engine(clock.clone(), engine);
    let loan = book.create_loan(product.terms_for(scenario.principal)?)?;
    info!(
        "running scenario for product {} with {} steps",
        product.name,
        scenario.steps.len()
    );

    let mut templates = Vec::new();
    let mut rejected = Vec::new();

    for (index, step) in scenario.steps.iter().enumerate() {
        clock.set(step.on);
        let on = step.on;
        let action = step.action.label();
        debug!("step {} {} on {}", index, action, on);

        let result = match &step.action {
            StepAction::Disburse { amount, date } => book
                .disburse(loan, *amount, date.unwrap_or(on))
                .map(|_| StepOutcome::Done),
            StepAction::Repay {
                amount,
                date,
                external_id,
            } => book
                .repay(loan, *amount, date.unwrap_or(on), external_id.clone())
                .map(|_| StepOutcome::Done),
            StepAction::Chargeback {
                external_id,
                amount,
            } => book
                .chargeback(loan, external_id, *amount)
                .map(|_| StepOutcome::Done),
            StepAction::AddCharge {
                kind,
                amount,
                due_date,
            } => book
                .add_charge(loan, *kind, *amount, due_date.unwrap_or(on))
                .map(|_| StepOutcome::Done),
            StepAction::ReAge {
                frequency,
                number_of_installments,
                start_date,
                interest_handling,
                transaction_amount,
            } => {
                let mut request = ReAgeRequest::new(*frequency, *number_of_installments, *start_date)
                    .with_interest_handling(*interest_handling);
                request.transaction_amount = *transaction_amount;
                book.re_age(loan, &request).map(|_| StepOutcome::Done)
            }
            StepAction::UndoReAge => book.undo_re_age(loan).map(|_| StepOutcome::Done),
            StepAction::Reverse {
                transaction,
                external_id,
                reversal_date,
            } => resolve_target(&book, loan, index, *transaction, external_id.as_deref())?
                .and_then(|id| book.reverse(loan, id, reversal_date.unwrap_or(on)))
                .map(|_| StepOutcome::Done),
            StepAction::Template => book.re_age_template(loan).map(StepOutcome::Template),
        };

        match (result, &step.expect_error) {
            (Ok(StepOutcome::Template(template)), None) => {
                templates.push(TemplateRecord { on, template });
            }
            (Ok(StepOutcome::Done), None) => {}
            (Ok(_), Some(expected)) => {
                return Err(ScenarioError::UnexpectedSuccess {
                    index,
                    action,
                    expected: expected.clone(),
                });
            }
            (Err(err), Some(expected)) if err.code() == expected.as_str() => {
                rejected.push(RejectedStep {
                    index,
                    action,
                    code: err.code(),
                });
            }
            (Err(err), Some(expected)) => {
                return Err(ScenarioError::WrongError {
                    index,
                    action,
                    expected: expected.clone(),
                    actual: err.code(),
                });
            }
            (Err(source), None) => {
                return Err(ScenarioError::Step {
                    index,
                    action,
                    source,
                });
            }
        }
    }

    Ok(ScenarioReport {
        product: product.name,
        snapshot: book.snapshot(loan)?,
        templates,
        rejected,
        events: book.drain_events(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_json;
    use crate::core::loan::LoanStatus;
    use rust_decimal_macros::dec;

    const REVERSE_REPLAY: &str = r#"{
        "product": {
            "name": "every-15-days",
            "down_payment": { "percentage": "25", "auto_repayment": true },
            "repayment_frequency": { "unit": "DAYS", "every": 15 },
            "number_of_installments": 3
        },
        "principal": "1250",
        "steps": [
            { "on": "2023-01-01", "action": "disburse", "amount": "500" },
            { "on": "2023-02-27", "action": "re_age",
              "frequency": { "unit": "MONTHS", "every": 1 },
              "number_of_installments": 6, "start_date": "2023-03-01" },
            { "on": "2023-02-27", "action": "repay", "amount": "125", "date": "2023-02-01" },
            { "on": "2023-02-28", "action": "repay", "amount": "200", "date": "2023-02-02",
              "external_id": "late" },
            { "on": "2023-02-28", "action": "reverse", "external_id": "late" },
            { "on": "2023-03-01", "action": "undo_re_age" },
            { "on": "2023-03-02", "action": "undo_re_age",
              "expect_error": "error.msg.loan.transaction.not.found" },
            { "on": "2023-03-02", "action": "template" }
        ]
    }"#;

    #[test]
    fn test_reverse_replay_script() {
        let scenario: Scenario = from_json(REVERSE_REPLAY).unwrap();
        let report = run_scenario(&scenario).unwrap();

        assert_eq!(report.product, "every-15-days");
        assert_eq!(report.snapshot.status, LoanStatus::Active);
        assert_eq!(report.snapshot.total_outstanding, dec!(250));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.templates.len(), 1);
        assert_eq!(report.templates[0].template.number_of_future_installments, 0);

        let re_age = report
            .snapshot
            .transactions
            .iter()
            .find(|t| t.kind == "Re-age")
            .unwrap();
        assert!(re_age.reversed);
        assert_eq!(re_age.amount, dec!(250));
    }

    #[test]
    fn test_unexpected_failure_reports_step() {
        let scenario = Scenario {
            product: LoanProduct::default(),
            overrides: ProductOverrides::default(),
            engine: EngineConfig::default(),
            principal: dec!(1000),
            steps: vec![ScenarioStep::new(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                StepAction::Repay {
                    amount: dec!(10),
                    date: None,
                    external_id: None,
                },
            )],
        };
        let err = run_scenario(&scenario).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Step {
                index: 0,
                source: LoanError::NotDisbursed,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_scenario() {
        let scenario = Scenario {
            product: LoanProduct::default(),
            overrides: ProductOverrides::default(),
            engine: EngineConfig::default(),
            principal: dec!(1000),
            steps: Vec::new(),
        };
        assert!(matches!(run_scenario(&scenario), Err(ScenarioError::Empty)));
    }
}
