//! Tunables shared by the fetchers.

use std::time::Duration;
use usagewatch_fetch::ssh::{tail_command, SshOptions};

/// Timeouts and remote-command settings for one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Options applied to every ssh invocation.
    pub ssh: SshOptions,
    /// Wait for each "shell looks ready" signal.
    pub ready_timeout: Duration,
    /// Wait for the usage rows after the tail command is typed.
    pub data_timeout: Duration,
    /// Overall limit for a direct one-shot fetch.
    pub direct_timeout: Duration,
    /// Wait for the session to exit after it is killed.
    pub teardown_timeout: Duration,
    /// Slice for one poll of the terminal stream.
    pub poll_interval: Duration,
    /// Ready signals accepted after the nested login before the target
    /// shell is trusted. The first may be a banner rather than a prompt.
    pub target_ready_signals: usize,
    /// Usage log path on the target.
    pub remote_log_path: String,
    /// Rows requested from the log.
    pub tail_lines: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ssh: SshOptions::with_connect_timeout(Duration::from_secs(10)),
            ready_timeout: Duration::from_secs(30),
            data_timeout: Duration::from_secs(60),
            direct_timeout: Duration::from_secs(15),
            teardown_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            target_ready_signals: 2,
            remote_log_path: "~/usage.csv".to_string(),
            tail_lines: 2,
        }
    }
}

impl MonitorSettings {
    /// The remote command that prints the usage rows.
    pub fn remote_command(&self) -> String {
        tail_command(&self.remote_log_path, self.tail_lines)
    }
}
