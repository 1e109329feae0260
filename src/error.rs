//! Error types for the preferences store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by preference nodes and their supporting layers.
///
/// Malformed documents and failed typed-getter coercions never show up here;
/// both are recovered where they happen.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Value written to {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("Invalid node name: {0:?}")]
    InvalidNodeName(String),

    #[error("Failed to decode fallback field '{key}': {source}")]
    Fallback {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PrefsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrefsError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for PrefsError {
    fn from(err: config::ConfigError) -> Self {
        PrefsError::Config(err.to_string())
    }
}

pub type Result<T, E = PrefsError> = std::result::Result<T, E>;
