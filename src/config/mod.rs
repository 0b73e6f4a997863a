//! Immutable configuration records: loan products, per-loan overrides and
//! replay engine settings, all loadable from JSON.

pub mod engine;
pub mod product;

pub use engine::{AllocationRule, EngineConfig};
pub use product::{LoanProduct, ProductOverrides};

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("component order must name principal, interest, fee and penalty exactly once")]
    InvalidComponentOrder,
}

/// Deserialize a JSON document from a string.
pub fn from_json<T: DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_json(&content)
}
