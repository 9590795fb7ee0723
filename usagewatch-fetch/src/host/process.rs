//! One-shot subprocess execution.
//!
//! Used for direct-mode fetches, where a single non-interactive ssh command
//! runs and the connection closes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;
use crate::patterns::strip_ansi;
use crate::ssh::SshCommand;

// ============================================================================
// Process Output
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output content.
    pub stdout: String,
    /// Standard error content.
    pub stderr: String,
    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,
    /// How long the command took to execute.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the stdout if successful, otherwise an error.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NonZeroExit` carrying stderr, trimmed and with
    /// escape codes removed.
    pub fn stdout_if_success(&self) -> Result<&str, ProcessError> {
        if self.success() {
            Ok(&self.stdout)
        } else {
            Err(ProcessError::NonZeroExit {
                code: self.exit_code,
                stderr: strip_ansi(self.stderr.trim()),
            })
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// Runs subprocesses with a timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Run a built ssh command.
    ///
    /// # Errors
    ///
    /// See [`ProcessRunner::run_with_options`].
    #[instrument(skip(self, command), fields(program = %command.program()))]
    pub async fn run_ssh(
        &self,
        command: &SshCommand,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!(command = %command, "Running ssh command");
        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = command
            .env()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.run_with_options(command.program(), &args, &env, timeout)
            .await
    }

    /// Run a command with environment variables and a timeout.
    ///
    /// The child is killed if the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NotFound` if `cmd` is not on PATH,
    /// `ProcessError::Timeout` if it runs too long, or `ProcessError::Io`
    /// if it cannot be spawned. A non-zero exit is not an error here.
    pub async fn run_with_options(
        &self,
        cmd: &str,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        // Find the command
        let cmd_path = self.which(cmd).ok_or_else(|| {
            warn!(cmd = %cmd, "Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        let start = Instant::now();

        let mut command = Command::new(&cmd_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            command.env(key, value);
        }

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(cmd = %cmd, timeout = ?timeout, "Command timed out");
                return Err(ProcessError::Timeout(timeout));
            }
        };

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            duration,
        };

        debug!(
            exit_code = exit_code,
            duration = ?duration,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed"
        );

        Ok(result)
    }

    /// Find the path to a command.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_which() {
        let runner = ProcessRunner::new();
        assert!(runner.which("sh").is_some());
        assert!(runner.which("definitely_not_a_real_command_12345").is_none());
    }

    #[test]
    fn test_stdout_if_success() {
        assert_eq!(output(0, "rows\n", "").stdout_if_success().unwrap(), "rows\n");

        let err = output(255, "", "\x1b[31mPermission denied (publickey).\x1b[0m\n")
            .stdout_if_success()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command failed with status 255: Permission denied (publickey)."
        );
    }

    #[tokio::test]
    async fn test_run_echo() {
        let runner = ProcessRunner::new();

        let output = runner
            .run_with_options("echo", &["hello", "world"], &[], TIMEOUT)
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello world");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_failure_is_not_an_error() {
        let runner = ProcessRunner::new();

        let output = runner
            .run_with_options("sh", &["-c", "echo oops >&2; exit 3"], &[], TIMEOUT)
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "oops");
        assert!(matches!(
            output.stdout_if_success(),
            Err(ProcessError::NonZeroExit { code: 3, ref stderr }) if stderr == "oops"
        ));
    }

    #[tokio::test]
    async fn test_run_with_env() {
        let runner = ProcessRunner::new();

        let output = runner
            .run_with_options("sh", &["-c", "echo $SSHPASS"], &[("SSHPASS", "s3cret")], TIMEOUT)
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "s3cret");
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let runner = ProcessRunner::new();

        let result = runner
            .run_with_options("sleep", &["5"], &[], Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(ProcessError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_not_found() {
        let runner = ProcessRunner::new();

        let result = runner
            .run_with_options("not_a_real_command_xyz", &[], &[], TIMEOUT)
            .await;

        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }
}
