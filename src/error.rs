//! Error types.
//!
//! The graph and projection core never fails: missing references, unknown
//! focus ids and empty embedding sets all produce degenerate results. Errors
//! only come from the edges of the crate (persistence and configuration).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`KnowledgeStore`](crate::store::KnowledgeStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// The backing store predates a feature (e.g. no embedding table yet).
    #[error("store does not support {0}")]
    Unsupported(&'static str),

    #[error("storage error: {0}")]
    Backend(String),
}

/// Errors raised while loading or validating [`LoomConfig`](crate::config::LoomConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum LoomError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoomError {
    /// Whether the caller should fall back to a non-spatial view rather than
    /// surface the failure.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            LoomError::Store(StoreError::Unsupported(_))
                | LoomError::Store(StoreError::Backend(_))
                | LoomError::Store(StoreError::Io(_))
        )
    }
}
