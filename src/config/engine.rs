use crate::config::ConfigError;
use crate::core::installment::ComponentKind;
use crate::engine::allocation::{
    AllocationStrategy, DueOrderByComponent, OldestDueFirst, DEFAULT_COMPONENT_ORDER,
};
use crate::engine::replay::ReplayEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which allocation strategy the replay engine is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRule {
    #[default]
    OldestDueFirst,
    DueOrderByComponent,
}

/// Replay engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub allocation: AllocationRule,
    #[serde(default = "default_component_order")]
    pub component_order: Vec<ComponentKind>,
}

fn default_component_order() -> Vec<ComponentKind> {
    DEFAULT_COMPONENT_ORDER.to_vec()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationRule::default(),
            component_order: default_component_order(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let complete = self.component_order.len() == DEFAULT_COMPONENT_ORDER.len()
            && DEFAULT_COMPONENT_ORDER
                .iter()
                .all(|k| self.component_order.contains(k));
        if complete {
            Ok(())
        } else {
            Err(ConfigError::InvalidComponentOrder)
        }
    }

    pub fn build_engine(&self) -> Result<ReplayEngine, ConfigError> {
        self.validate()?;
        let order = self.component_order.clone();
        let strategy: Arc<dyn AllocationStrategy> = match self.allocation {
            AllocationRule::OldestDueFirst => Arc::new(OldestDueFirst::with_order(order)),
            AllocationRule::DueOrderByComponent => Arc::new(DueOrderByComponent::with_order(order)),
        };
        Ok(ReplayEngine::new(strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_json;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: EngineConfig = from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.build_engine().unwrap().allocation().name(), "oldest-due-first");
    }

    #[test]
    fn test_component_order_must_be_complete() {
        let config: EngineConfig = from_json(
            r#"{ "allocation": "due_order_by_component", "component_order": ["principal", "fee"] }"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_engine(),
            Err(ConfigError::InvalidComponentOrder)
        ));
    }

    #[test]
    fn test_due_order_by_component() {
        let config: EngineConfig = from_json(
            r#"{ "allocation": "due_order_by_component",
                 "component_order": ["principal", "interest", "fee", "penalty"] }"#,
        )
        .unwrap();
        assert_eq!(
            config.build_engine().unwrap().allocation().name(),
            "due-order-by-component"
        );
    }
}
