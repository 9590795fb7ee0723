//! PTY-backed interactive ssh sessions.
//!
//! [`PtySessionOpener`] spawns `ssh -tt` (or `sshpass -e ssh -tt`) under a
//! pseudo-terminal so the remote side behaves as if a user were attached:
//! prompts and clear-screen codes only appear on a terminal. The child's
//! stderr shares the terminal with stdout.
//!
//! A reader thread pumps the PTY master into a channel; [`PtySession`]
//! drains it with a per-call slice, decoding UTF-8 across chunk
//! boundaries.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use usagewatch_core::HostConfig;
//! use usagewatch_fetch::host::pty::PtySessionOpener;
//! use usagewatch_fetch::patterns::is_ready;
//! use usagewatch_fetch::session::{SessionOpener, Terminal};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let opener = PtySessionOpener::default();
//! let session = opener.open(&HostConfig::new("bastion.example.net", "ops"))?;
//! let mut term = Terminal::new(session);
//! let capture = term.read_until(Duration::from_secs(30), is_ready);
//! println!("ready: {}", capture.matched());
//! # Ok(())
//! # }
//! ```

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};
use usagewatch_core::HostConfig;

use crate::error::PtyError;
use crate::session::{PollEvent, SessionOpener, ShellSession};
use crate::ssh::{SshCommand, SshOptions};

// ============================================================================
// Constants
// ============================================================================

/// Default terminal width in columns.
const DEFAULT_COLS: u16 = 200;

/// Default terminal height in rows.
const DEFAULT_ROWS: u16 = 50;

/// Buffer size for reading from PTY.
const READ_BUFFER_SIZE: usize = 4096;

/// Interval between exit checks while waiting for a killed child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Opener
// ============================================================================

/// Spawns interactive ssh logins under a PTY.
#[derive(Debug, Clone)]
pub struct PtySessionOpener {
    cols: u16,
    rows: u16,
    options: SshOptions,
}

impl Default for PtySessionOpener {
    fn default() -> Self {
        Self::new(SshOptions::default())
    }
}

impl PtySessionOpener {
    /// Creates an opener with the default terminal size.
    pub fn new(options: SshOptions) -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            options,
        }
    }

    /// Find a binary on PATH.
    pub fn which(binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }
}

impl SessionOpener for PtySessionOpener {
    type Session = PtySession;

    #[instrument(skip(self, host), fields(host = %host.hostname, port = host.port))]
    fn open(&self, host: &HostConfig) -> Result<PtySession, PtyError> {
        let command = SshCommand::interactive(host, &self.options);

        let binary_path = Self::which(command.program()).ok_or_else(|| {
            warn!(binary = %command.program(), "Binary not found");
            PtyError::NotFound(command.program().to_string())
        })?;

        debug!(command = %command, "Spawning interactive session");

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&binary_path);
        cmd.args(command.args());
        for (key, value) in command.env() {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

        // The child holds its own copy; ours would keep the master from
        // seeing EOF once the child exits.
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY writer: {}", e)))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY reader: {}", e)))?;

        let (tx, rx) = mpsc::channel::<PtyMessage>();
        thread::spawn(move || read_pty_output(reader, tx));

        debug!(pid = ?child.process_id(), "Session spawned");

        Ok(PtySession {
            child,
            writer,
            rx,
            _master: pair.master,
            carry: Vec::new(),
            eof: false,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// Internal message type for PTY communication.
#[derive(Debug)]
enum PtyMessage {
    /// Data read from PTY.
    Data(Vec<u8>),
    /// PTY read error.
    Error(std::io::Error),
    /// PTY closed (EOF).
    Closed,
}

/// An ssh client running under a PTY.
pub struct PtySession {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    rx: mpsc::Receiver<PtyMessage>,
    _master: Box<dyn MasterPty + Send>,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
    eof: bool,
}

impl ShellSession for PtySession {
    fn write_str(&mut self, text: &str) -> Result<(), PtyError> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn poll_read(&mut self, slice: Duration) -> Result<PollEvent, PtyError> {
        if self.eof {
            return Ok(PollEvent::Closed);
        }
        match self.rx.recv_timeout(slice) {
            Ok(PtyMessage::Data(data)) => {
                trace!(len = data.len(), "PTY data");
                Ok(PollEvent::Data(decode_utf8(&mut self.carry, &data)))
            }
            Ok(PtyMessage::Error(e)) => {
                self.eof = true;
                Err(PtyError::Io(e))
            }
            Ok(PtyMessage::Closed) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!("PTY closed");
                self.eof = true;
                Ok(PollEvent::Closed)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(PollEvent::Idle),
        }
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self, wait: Duration) -> Result<(), PtyError> {
        if !self.is_alive() {
            return Ok(());
        }
        if let Err(e) = self.child.kill() {
            // It may have exited between the check and the kill.
            if !self.is_alive() {
                return Ok(());
            }
            return Err(PtyError::Io(e));
        }

        let start = Instant::now();
        while start.elapsed() < wait {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(exit_code = status.exit_code(), "Session exited");
                    return Ok(());
                }
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => return Err(PtyError::Io(e)),
            }
        }
        Err(PtyError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("child still running {wait:?} after kill"),
        )))
    }
}

/// Read output from PTY in a separate thread.
fn read_pty_output(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<PtyMessage>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                let _ = tx.send(PtyMessage::Closed);
                break;
            }
            Ok(n) => {
                if tx.send(PtyMessage::Data(buffer[..n].to_vec())).is_err() {
                    // Receiver dropped, exit
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(PtyMessage::Error(e));
                break;
            }
        }
    }
}

/// Decodes `data` appended to `carry`, leaving an incomplete trailing
/// sequence in `carry` for the next chunk. Invalid bytes become U+FFFD.
fn decode_utf8(carry: &mut Vec<u8>, data: &[u8]) -> String {
    carry.extend_from_slice(data);
    let mut out = String::new();
    loop {
        match std::str::from_utf8(carry) {
            Ok(text) => {
                out.push_str(text);
                carry.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(std::str::from_utf8(&carry[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        carry.drain(..valid + bad);
                    }
                    None => {
                        carry.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain() {
        let mut carry = Vec::new();
        assert_eq!(decode_utf8(&mut carry, b"hello"), "hello");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_decode_split_multibyte() {
        let bytes = "grüß".as_bytes();
        let mut carry = Vec::new();

        let first = decode_utf8(&mut carry, &bytes[..3]);
        assert_eq!(first, "gr");
        assert_eq!(carry.len(), 1);

        let second = decode_utf8(&mut carry, &bytes[3..]);
        assert_eq!(second, "üß");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_decode_invalid_byte() {
        let mut carry = Vec::new();
        assert_eq!(decode_utf8(&mut carry, b"a\xffb"), "a\u{FFFD}b");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_decode_keeps_escape_sequences() {
        let mut carry = Vec::new();
        assert_eq!(decode_utf8(&mut carry, b"\x1b[2J\x1b[H$ "), "\x1b[2J\x1b[H$ ");
    }

    #[test]
    fn test_which_nonexistent() {
        assert!(PtySessionOpener::which("definitely_not_a_real_command_xyz123").is_none());
    }
}
