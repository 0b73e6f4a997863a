//! Scripted and randomly generated loan histories.

pub mod history;
pub mod script;

pub use history::{generate_random_history, HistoryConfig};
pub use script::{run_scenario, Scenario, ScenarioError, ScenarioReport, ScenarioStep, StepAction};
