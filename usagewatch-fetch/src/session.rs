//! Interactive session primitives.
//!
//! A [`ShellSession`] is a live child process behind a terminal: lines go in,
//! a character stream comes out. [`Terminal`] wraps one and provides the
//! single blocking primitive everything else is built on,
//! [`Terminal::read_until`]: poll the stream in short slices, feed it one
//! character at a time into a buffer, and stop when a predicate accepts the
//! buffer or the timeout elapses.
//!
//! Characters that arrive after a match are kept for the next wait, so no
//! output is lost between steps. A terminal may carry a cancel flag; a set
//! flag ends the current wait at the next poll slice.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use usagewatch_core::HostConfig;

use crate::error::PtyError;
use crate::patterns::strip_ansi;

// ============================================================================
// Constants
// ============================================================================

/// Default slice for one poll of the output stream.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Session Traits
// ============================================================================

/// What one poll of the output stream produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Decoded output.
    Data(String),
    /// Nothing arrived within the slice.
    Idle,
    /// The stream reached EOF.
    Closed,
}

/// A live interactive child process.
pub trait ShellSession: Send {
    /// Writes raw text to the child's input and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input stream is closed.
    fn write_str(&mut self, text: &str) -> Result<(), PtyError>;

    /// Waits at most `slice` for output.
    ///
    /// # Errors
    ///
    /// Returns an error if reading failed.
    fn poll_read(&mut self, slice: Duration) -> Result<PollEvent, PtyError>;

    /// Returns true while the child is running.
    fn is_alive(&mut self) -> bool;

    /// Kills the child and waits up to `wait` for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the child could not be signalled or did not exit
    /// in time.
    fn terminate(&mut self, wait: Duration) -> Result<(), PtyError>;
}

/// Opens interactive sessions to hosts.
pub trait SessionOpener: Send + Sync {
    /// Session type produced.
    type Session: ShellSession;

    /// Spawns an interactive login to `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client process cannot be spawned.
    fn open(&self, host: &HostConfig) -> Result<Self::Session, PtyError>;
}

// ============================================================================
// Capture
// ============================================================================

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEnd {
    /// The predicate accepted the buffer.
    Matched,
    /// The timeout elapsed first.
    TimedOut,
    /// The child exited or its stream closed first.
    Closed,
    /// The cancel flag was set.
    Cancelled,
}

/// Raw text accumulated during one wait, kept on every outcome for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Raw output, escape codes included.
    pub raw: String,
    /// How the wait ended.
    pub end: WaitEnd,
    /// Time spent waiting.
    pub elapsed: Duration,
}

impl Capture {
    /// Returns true if the predicate matched.
    pub fn matched(&self) -> bool {
        self.end == WaitEnd::Matched
    }

    /// Output with escape codes removed.
    pub fn stripped(&self) -> String {
        strip_ansi(&self.raw)
    }

    /// Last `max_chars` characters of the stripped output.
    pub fn tail(&self, max_chars: usize) -> String {
        let stripped = self.stripped();
        let count = stripped.chars().count();
        stripped.chars().skip(count.saturating_sub(max_chars)).collect()
    }
}

// ============================================================================
// Terminal
// ============================================================================

/// A session plus the characters received but not yet consumed by a wait.
pub struct Terminal<S> {
    session: S,
    pending: VecDeque<char>,
    poll_interval: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: ShellSession> Terminal<S> {
    /// Wraps a session with the default poll interval.
    pub fn new(session: S) -> Self {
        Self::with_poll_interval(session, DEFAULT_POLL_INTERVAL)
    }

    /// Wraps a session with a custom poll interval.
    pub fn with_poll_interval(session: S, poll_interval: Duration) -> Self {
        Self {
            session,
            pending: VecDeque::new(),
            poll_interval,
            cancel: None,
        }
    }

    /// Ends waits early once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Writes `text` and a newline; no acknowledgement is awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if the input stream is closed.
    pub fn send_line(&mut self, text: &str) -> Result<(), PtyError> {
        trace!(len = text.len(), "Sending line");
        self.session.write_str(&format!("{text}\n"))
    }

    /// Accumulates output until `predicate` accepts the buffer, `timeout`
    /// elapses, the child goes away, or the cancel flag is set.
    ///
    /// The predicate is tested after every character.
    pub fn read_until<F>(&mut self, timeout: Duration, predicate: F) -> Capture
    where
        F: Fn(&str) -> bool,
    {
        let start = Instant::now();
        let mut buffer = String::new();

        loop {
            while let Some(ch) = self.pending.pop_front() {
                buffer.push(ch);
                if predicate(&buffer) {
                    trace!(len = buffer.len(), "Predicate matched");
                    return Self::capture(buffer, WaitEnd::Matched, start);
                }
            }

            if self.is_cancelled() {
                debug!(captured = buffer.len(), "Wait cancelled");
                return Self::capture(buffer, WaitEnd::Cancelled, start);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(timeout = ?timeout, captured = buffer.len(), "Wait timed out");
                return Self::capture(buffer, WaitEnd::TimedOut, start);
            }

            let slice = self.poll_interval.min(timeout - elapsed);
            match self.session.poll_read(slice) {
                Ok(PollEvent::Data(chunk)) => self.pending.extend(chunk.chars()),
                Ok(PollEvent::Idle) => {
                    if !self.session.is_alive() {
                        debug!("Session exited while waiting");
                        return Self::capture(buffer, WaitEnd::Closed, start);
                    }
                }
                Ok(PollEvent::Closed) => {
                    debug!("Session stream closed while waiting");
                    return Self::capture(buffer, WaitEnd::Closed, start);
                }
                Err(e) => {
                    warn!(error = %e, "Session read failed");
                    return Self::capture(buffer, WaitEnd::Closed, start);
                }
            }
        }
    }

    fn capture(raw: String, end: WaitEnd, start: Instant) -> Capture {
        Capture {
            raw,
            end,
            elapsed: start.elapsed(),
        }
    }

    /// Returns true while the child is running.
    pub fn is_alive(&mut self) -> bool {
        self.session.is_alive()
    }

    /// Kills the child and waits up to `wait` for it.
    ///
    /// # Errors
    ///
    /// See [`ShellSession::terminate`].
    pub fn terminate(&mut self, wait: Duration) -> Result<(), PtyError> {
        self.session.terminate(wait)
    }

    /// The wrapped session.
    pub fn session(&self) -> &S {
        &self.session
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{has_csv_rows, is_ready};

    /// Replays scripted chunks, then idles.
    struct Scripted {
        chunks: VecDeque<PollEvent>,
        written: Vec<String>,
        alive: bool,
    }

    impl Scripted {
        fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| PollEvent::Data((*c).to_string())).collect(),
                written: Vec::new(),
                alive: true,
            }
        }
    }

    impl ShellSession for Scripted {
        fn write_str(&mut self, text: &str) -> Result<(), PtyError> {
            self.written.push(text.to_string());
            Ok(())
        }

        fn poll_read(&mut self, slice: Duration) -> Result<PollEvent, PtyError> {
            match self.chunks.pop_front() {
                Some(event) => Ok(event),
                None => {
                    std::thread::sleep(slice);
                    Ok(PollEvent::Idle)
                }
            }
        }

        fn is_alive(&mut self) -> bool {
            self.alive
        }

        fn terminate(&mut self, _wait: Duration) -> Result<(), PtyError> {
            self.alive = false;
            Ok(())
        }
    }

    #[test]
    fn test_send_line_appends_newline() {
        let mut term = Terminal::new(Scripted::new(&[]));
        term.send_line("exit").unwrap();
        assert_eq!(term.session().written, vec!["exit\n"]);
    }

    #[test]
    fn test_read_until_matches_mid_chunk_and_keeps_rest() {
        let mut term = Terminal::new(Scripted::new(&["[root@box ~]# after"]));

        let first = term.read_until(Duration::from_secs(1), is_ready);
        assert!(first.matched());
        assert_eq!(first.raw, "[root@box ~]#");

        let second = term.read_until(Duration::from_millis(200), |b| b.ends_with("after"));
        assert!(second.matched());
        assert_eq!(second.raw, " after");
    }

    #[test]
    fn test_prompt_heuristic_fires_on_first_colon() {
        let mut term = Terminal::new(Scripted::new(&["ops@bastion:~$ "]));
        let capture = term.read_until(Duration::from_secs(1), is_ready);
        assert_eq!(capture.raw, "ops@bastion:");
    }

    #[test]
    fn test_read_until_across_chunks() {
        let mut term = Terminal::new(Scripted::new(&[
            "2024-01-01 00:00:00,10 KB,5 KB,50%,3%,40%\r\n2024-01-01 00:0",
            "1:00,15 KB,8 KB,51%,4%,41%\r\n",
        ]));
        let capture = term.read_until(Duration::from_secs(1), |b| has_csv_rows(b, 2));
        assert!(capture.matched());
    }

    #[test]
    fn test_read_until_timeout_keeps_output() {
        let mut term = Terminal::with_poll_interval(
            Scripted::new(&["\x1b[1mconnecting\x1b[0m"]),
            Duration::from_millis(10),
        );
        let timeout = Duration::from_millis(150);

        let capture = term.read_until(timeout, is_ready);

        assert_eq!(capture.end, WaitEnd::TimedOut);
        assert!(capture.elapsed >= timeout);
        assert!(capture.elapsed < timeout + Duration::from_millis(100));
        assert_eq!(capture.raw, "\x1b[1mconnecting\x1b[0m");
        assert_eq!(capture.stripped(), "connecting");
    }

    #[test]
    fn test_read_until_stops_when_child_exits() {
        let mut session = Scripted::new(&[]);
        session.alive = false;
        let mut term = Terminal::new(session);

        let capture = term.read_until(Duration::from_secs(5), is_ready);
        assert_eq!(capture.end, WaitEnd::Closed);
        assert!(capture.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_read_until_stops_on_eof() {
        let mut session = Scripted::new(&["partial"]);
        session.chunks.push_back(PollEvent::Closed);
        let mut term = Terminal::new(session);

        let capture = term.read_until(Duration::from_secs(5), is_ready);
        assert_eq!(capture.end, WaitEnd::Closed);
        assert_eq!(capture.raw, "partial");
    }

    #[test]
    fn test_read_until_stops_when_cancelled() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut term =
            Terminal::with_poll_interval(Scripted::new(&["connecting"]), Duration::from_millis(10))
                .with_cancel(Arc::clone(&flag));

        let setter = {
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::Relaxed);
            })
        };
        let capture = term.read_until(Duration::from_secs(5), is_ready);
        setter.join().unwrap();

        assert_eq!(capture.end, WaitEnd::Cancelled);
        assert_eq!(capture.raw, "connecting");
        assert!(capture.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_capture_tail() {
        let capture = Capture {
            raw: "\x1b[31mabcdef\x1b[0m".to_string(),
            end: WaitEnd::TimedOut,
            elapsed: Duration::ZERO,
        };
        assert_eq!(capture.tail(3), "def");
        assert_eq!(capture.tail(100), "abcdef");
    }
}
