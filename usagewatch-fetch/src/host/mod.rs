//! Host APIs for reaching remote machines.
//!
//! - [`pty`] - Interactive ssh sessions under a pseudo-terminal
//! - [`process`] - One-shot subprocess execution

pub mod process;
pub mod pty;

pub use process::{ProcessOutput, ProcessRunner};
pub use pty::{PtySession, PtySessionOpener};
