//! Core error types for `usagewatch`.

use thiserror::Error;

/// Core error type for inventory and model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid host or descriptor configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
