//! Fetch error types.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Process Error
// ============================================================================

/// Error type for one-shot process execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit code.
    #[error("Command failed with status {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// PTY Error
// ============================================================================

/// Error type for interactive PTY sessions.
#[derive(Debug, Error)]
pub enum PtyError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Failed to create PTY.
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    /// Failed to spawn process.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// The session's child has exited or its terminal was closed.
    #[error("Session closed")]
    Closed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
