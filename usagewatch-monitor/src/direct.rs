//! Direct fetch: one non-interactive ssh command, no proxy.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use usagewatch_core::HostConfig;
use usagewatch_fetch::patterns::strip_ansi;
use usagewatch_fetch::ssh::{SshCommand, SshOptions};
use usagewatch_fetch::{ProcessError, ProcessOutput, ProcessRunner};

use crate::error::MonitorError;
use crate::orchestrator::DirectSource;
use crate::settings::MonitorSettings;

/// Runs the tail command on a host in a single ssh invocation.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    runner: ProcessRunner,
    options: SshOptions,
    remote_command: String,
    timeout: Duration,
}

impl DirectFetcher {
    /// Creates a fetcher from monitor settings.
    pub fn new(settings: &MonitorSettings) -> Self {
        Self {
            runner: ProcessRunner::new(),
            options: settings.ssh.clone(),
            remote_command: settings.remote_command(),
            timeout: settings.direct_timeout,
        }
    }

    /// The command line that would be run for `host`.
    pub fn command_for(&self, host: &HostConfig) -> SshCommand {
        SshCommand::remote(host, &self.options, &self.remote_command)
    }
}

#[async_trait]
impl DirectSource for DirectFetcher {
    #[instrument(skip_all, fields(host = %host.hostname, port = host.port))]
    async fn fetch_direct(&self, host: &HostConfig) -> Result<Vec<String>, MonitorError> {
        let command = self.command_for(host);
        debug!(auth = host.auth().label(), "Running direct fetch");

        let output = self
            .runner
            .run_ssh(&command, self.timeout)
            .await
            .map_err(|e| spawn_error(host, e))?;
        output_lines(&output)
    }
}

/// Maps a failure to run ssh at all. Timeouts name the host.
fn spawn_error(host: &HostConfig, err: ProcessError) -> MonitorError {
    match err {
        ProcessError::Timeout(_) => {
            MonitorError::Connection(format!("SSH connection to {} timed out", host.hostname))
        }
        other => other.into(),
    }
}

/// Turns a finished ssh process into usage lines.
///
/// A non-zero exit or blank stdout is a command failure. Escape codes are
/// stripped from both streams.
fn output_lines(output: &ProcessOutput) -> Result<Vec<String>, MonitorError> {
    let stdout = strip_ansi(output.stdout_if_success()?.trim());
    if stdout.is_empty() {
        return Err(MonitorError::Command(
            "No output received from remote command".to_string(),
        ));
    }

    Ok(stdout.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_output_lines_success() {
        let out = output(
            0,
            "2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40%\n2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%\n",
            "",
        );
        let lines = output_lines(&out).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2024-01-01 00:01:00"));
    }

    #[test]
    fn test_output_lines_nonzero_exit() {
        let out = output(255, "", "\x1b[31mPermission denied (publickey).\x1b[0m\n");
        let err = output_lines(&out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command failed: Command failed with status 255: Permission denied (publickey)."
        );
    }

    #[test]
    fn test_output_lines_empty() {
        let err = output_lines(&output(0, "  \n", "")).unwrap_err();
        assert_eq!(
            err,
            MonitorError::Command("No output received from remote command".into())
        );
    }

    #[test]
    fn test_spawn_error_mapping() {
        let host = HostConfig::new("web1", "ops");

        let timeout = spawn_error(&host, ProcessError::Timeout(Duration::from_secs(15)));
        assert_eq!(
            timeout,
            MonitorError::Connection("SSH connection to web1 timed out".into())
        );

        let missing = spawn_error(&host, ProcessError::NotFound("sshpass".into()));
        assert_eq!(
            missing.to_string(),
            "Connection failed: Failed to execute SSH command: Command not found: sshpass"
        );
    }

    #[test]
    fn test_command_for_host() {
        let fetcher = DirectFetcher::new(&MonitorSettings::default());
        let host = HostConfig::new("web1", "ops").with_port(2222);

        let command = fetcher.command_for(&host);

        assert_eq!(command.program(), "ssh");
        assert_eq!(
            command.args().last().map(String::as_str),
            Some("tail -2 ~/usage.csv 2>/dev/null")
        );
    }
}
