//! ssh command-line construction.
//!
//! Three shapes are built here:
//!
//! - an interactive login spawned locally (`ssh -tt ... user@proxy`)
//! - a one-shot remote command spawned locally (`ssh ... user@host 'tail ...'`)
//! - a nested login line typed into an already-open proxy shell
//!
//! Host-key verification is always disabled: hosts come from a trusted
//! inventory, not from known_hosts state. Locally spawned password logins go
//! through `sshpass -e` with the password in the child environment; the
//! nested line runs on the proxy and embeds `sshpass -p` instead.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use usagewatch_core::{AuthMethod, HostConfig};

// ============================================================================
// Constants
// ============================================================================

/// ssh client binary.
pub const SSH_BINARY: &str = "ssh";

/// Password wrapper binary.
pub const SSHPASS_BINARY: &str = "sshpass";

/// Environment variable read by `sshpass -e`.
const SSHPASS_ENV: &str = "SSHPASS";

/// Placeholder shown instead of a password.
const REDACTED: &str = "***";

const HOST_KEY_OPTIONS: [&str; 4] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
];

// ============================================================================
// Options
// ============================================================================

/// Options applied to every ssh invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    /// `ConnectTimeout` passed to ssh. Whole seconds, at least one.
    pub connect_timeout: Option<Duration>,
}

impl SshOptions {
    /// Options with a connect timeout.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }

    fn push_connect_timeout(&self, args: &mut Vec<String>) {
        if let Some(timeout) = self.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={}", timeout.as_secs().max(1)));
        }
    }
}

// ============================================================================
// Local Commands
// ============================================================================

/// A locally spawned ssh process: program, argv and extra environment.
#[derive(Clone, PartialEq, Eq)]
pub struct SshCommand {
    program: &'static str,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl SshCommand {
    /// Interactive login with forced remote PTY allocation.
    pub fn interactive(host: &HostConfig, options: &SshOptions) -> Self {
        Self::build(host, options, None)
    }

    /// One-shot remote command; the connection closes when it exits.
    pub fn remote(host: &HostConfig, options: &SshOptions, remote_command: &str) -> Self {
        Self::build(host, options, Some(remote_command))
    }

    fn build(host: &HostConfig, options: &SshOptions, remote_command: Option<&str>) -> Self {
        let auth = host.auth();
        let mut args = Vec::new();
        let mut env = Vec::new();

        let program = if let AuthMethod::Password(password) = auth {
            args.push("-e".to_string());
            args.push(SSH_BINARY.to_string());
            env.push((SSHPASS_ENV.to_string(), password.to_string()));
            SSHPASS_BINARY
        } else {
            SSH_BINARY
        };

        if remote_command.is_none() {
            args.push("-tt".to_string());
        }
        args.extend(HOST_KEY_OPTIONS.iter().map(ToString::to_string));
        options.push_connect_timeout(&mut args);

        match auth {
            AuthMethod::Key(path) => {
                args.push("-i".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
            AuthMethod::Agent if remote_command.is_some() => {
                // Nothing can answer a password prompt on a one-shot command.
                args.push("-o".to_string());
                args.push("BatchMode=yes".to_string());
            }
            AuthMethod::Password(_) | AuthMethod::Agent => {}
        }

        args.push("-p".to_string());
        args.push(host.port.to_string());
        args.push(host.destination());

        if let Some(command) = remote_command {
            args.push(command.to_string());
        }

        Self { program, args, env }
    }

    /// Binary to run.
    pub fn program(&self) -> &str {
        self.program
    }

    /// Arguments, never containing a password.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment for the child.
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }
}

impl fmt::Display for SshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program).chain(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

impl fmt::Debug for SshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCommand")
            .field("command", &self.to_string())
            .field("env", &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Lines Typed Into A Remote Shell
// ============================================================================

/// A line to type into a remote shell, with a log-safe rendering.
#[derive(Clone, PartialEq, Eq)]
pub struct ShellLine {
    text: String,
    display: String,
}

impl ShellLine {
    /// The exact text to send.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text with secrets masked.
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl fmt::Debug for ShellLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShellLine").field(&self.display).finish()
    }
}

/// Builds the nested login line typed into the proxy shell.
///
/// The key path is passed as declared since it refers to the proxy's
/// filesystem. Key and password flags are both embedded when both are set.
pub fn nested_login_line(target: &HostConfig, options: &SshOptions) -> ShellLine {
    let mut tail = vec![SSH_BINARY.to_string()];
    if let Some(key) = target.key_filepath.as_deref() {
        tail.push("-i".to_string());
        tail.push(key.to_string_lossy().into_owned());
    }
    tail.extend(HOST_KEY_OPTIONS.iter().map(ToString::to_string));
    options.push_connect_timeout(&mut tail);
    tail.push("-p".to_string());
    tail.push(target.port.to_string());
    tail.push(target.destination());

    let tail = shell_words::join(&tail);

    match target.password.as_deref() {
        Some(password) => {
            let quoted: Cow<'_, str> = shell_words::quote(password);
            ShellLine {
                text: format!("{SSHPASS_BINARY} -p {quoted} {tail}"),
                display: format!("{SSHPASS_BINARY} -p {REDACTED} {tail}"),
            }
        }
        None => ShellLine {
            display: tail.clone(),
            text: tail,
        },
    }
}

/// Remote command printing the last `lines` rows of the usage log, with
/// errors discarded.
///
/// `path` is not quoted so that `~` expands on the remote side.
pub fn tail_command(path: &str, lines: usize) -> String {
    format!("tail -{lines} {path} 2>/dev/null")
}

// ============================================================================
// Tests
// ============================================================================
