// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # usagewatch Fetch
//!
//! Terminal and process plumbing for reaching remote hosts.
//!
//! ## Pattern Detection
//!
//! [`patterns`] holds stateless matchers over raw terminal output:
//! clear-screen and prompt detection, usage-row recognition, and ANSI
//! stripping.
//!
//! ## Sessions
//!
//! - [`session::ShellSession`] - A live interactive child process
//! - [`session::SessionOpener`] - Spawns sessions to hosts
//! - [`session::Terminal`] - `send_line` and the `read_until` wait primitive
//!
//! ## Host APIs
//!
//! - [`host::pty`] - PTY-backed ssh sessions
//! - [`host::process`] - One-shot subprocess execution
//!
//! ## ssh Command Lines
//!
//! [`ssh`] builds the interactive, one-shot and nested command lines.

pub mod error;
pub mod host;
pub mod patterns;
pub mod session;
pub mod ssh;

// Errors
pub use error::{ProcessError, PtyError};

// Host APIs
pub use host::{
    process::{ProcessOutput, ProcessRunner},
    pty::{PtySession, PtySessionOpener},
};

// Sessions
pub use session::{Capture, PollEvent, SessionOpener, ShellSession, Terminal, WaitEnd};

// Command lines
pub use ssh::{nested_login_line, tail_command, ShellLine, SshCommand, SshOptions};
