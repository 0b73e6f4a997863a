//! Replay engine, payment allocation, re-aging and the re-age template.

pub mod allocation;
pub mod reage;
pub mod replay;
pub mod template;

pub use allocation::{AllocationStrategy, DueOrderByComponent, OldestDueFirst};
pub use reage::{ReAgePlanner, ReAgeRequest};
pub use replay::{ReplayEngine, ReplayOutcome};
pub use template::{re_age_template, ReAgeTemplate};
