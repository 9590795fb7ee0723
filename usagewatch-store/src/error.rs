//! Store error types.

use thiserror::Error;
use usagewatch_core::CoreError;

/// Errors that can occur loading or saving configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No server matches the selector.
    #[error("Server not found: {0}")]
    ServerNotFound(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl StoreError {
    /// Returns true if the error means the file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
