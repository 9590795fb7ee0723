//! Monitor error types.
//!
//! Every failure of a fetch lands in one of four categories. The rendered
//! message is what callers show next to a server, so each variant's
//! `Display` names its category.

use thiserror::Error;
use usagewatch_core::CoreError;
use usagewatch_fetch::{ProcessError, PtyError};

/// Errors that can occur while fetching a server's usage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A host could not be reached or a shell never became ready.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The remote command failed or produced unusable output.
    #[error("Command failed: {0}")]
    Command(String),

    /// Too few structurally valid usage rows.
    #[error("Data parsing failed: {0}")]
    Parse(String),

    /// Anything unanticipated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Short category name, for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Command(_) => "command",
            Self::Parse(_) => "parse",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<PtyError> for MonitorError {
    fn from(err: PtyError) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<ProcessError> for MonitorError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NonZeroExit { .. } => Self::Command(err.to_string()),
            ProcessError::Timeout(_) => Self::Connection(err.to_string()),
            ProcessError::NotFound(_) | ProcessError::Io(_) => {
                Self::Connection(format!("Failed to execute SSH command: {err}"))
            }
        }
    }
}

impl From<CoreError> for MonitorError {
    fn from(err: CoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display_names_category() {
        assert_eq!(
            MonitorError::Connection("timed out".into()).to_string(),
            "Connection failed: timed out"
        );
        assert_eq!(
            MonitorError::Command("no output".into()).to_string(),
            "Command failed: no output"
        );
        assert_eq!(
            MonitorError::Parse("1 line".into()).to_string(),
            "Data parsing failed: 1 line"
        );
        assert_eq!(
            MonitorError::Internal("boom".into()).to_string(),
            "Internal error: boom"
        );
    }

    #[test]
    fn test_process_error_mapping() {
        let timeout: MonitorError = ProcessError::Timeout(Duration::from_secs(15)).into();
        assert_eq!(timeout.category(), "connection");

        let missing: MonitorError = ProcessError::NotFound("sshpass".into()).into();
        assert_eq!(
            missing.to_string(),
            "Connection failed: Failed to execute SSH command: Command not found: sshpass"
        );

        let exit: MonitorError = ProcessError::NonZeroExit {
            code: 255,
            stderr: "Permission denied".into(),
        }
        .into();
        assert_eq!(
            exit.to_string(),
            "Command failed: Command failed with status 255: Permission denied"
        );
    }

    #[test]
    fn test_pty_error_is_connection() {
        let err: MonitorError = PtyError::SpawnFailed("no pty".into()).into();
        assert_eq!(err.category(), "connection");
    }
}
