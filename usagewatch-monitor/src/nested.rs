//! Nested fetch through a proxy shell.
//!
//! The driver opens an interactive login on the proxy, types a second ssh
//! login to the target into that shell, then types the tail command and
//! collects the usage rows. Every step is a send followed by a
//! [`Terminal::read_until`] wait; there is no framing, only the raw
//! character stream.
//!
//! ```text
//! Disconnected -> ProxyConnecting -> ProxyReady -> TargetConnecting
//!   -> TargetReady -> TargetPrompted -> Fetching -> Done
//!
//! any non-terminal state -> Error
//! Done | Error -> Closing
//! ```
//!
//! `Closing` runs exactly once per fetch. If the session is still alive it
//! types `exit` for the target and the proxy shells, then kills the client
//! and waits a bounded time. Teardown failures are logged, never returned.
//!
//! The driver blocks, so [`NestedFetcher`] runs it on the blocking pool and
//! hands it a cancel flag that is set when the fetch future is dropped. A
//! cancelled wait fails the fetch and teardown runs as usual.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};
use usagewatch_core::HostConfig;
use usagewatch_fetch::patterns::{extract_rows, has_csv_rows, is_ready};
use usagewatch_fetch::session::{SessionOpener, ShellSession, Terminal, WaitEnd};
use usagewatch_fetch::ssh::nested_login_line;
use usagewatch_fetch::PtySessionOpener;

use crate::error::MonitorError;
use crate::orchestrator::NestedSource;
use crate::settings::MonitorSettings;

/// Characters of stripped output kept in diagnostics.
const DIAGNOSTIC_CHARS: usize = 2000;

// ============================================================================
// Driver State
// ============================================================================

/// Where a nested fetch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing opened yet.
    Disconnected,
    /// Spawning the login to the proxy.
    ProxyConnecting,
    /// The proxy shell signalled ready.
    ProxyReady,
    /// The nested login line was typed.
    TargetConnecting,
    /// The first ready signal after the nested login.
    TargetReady,
    /// Enough ready signals to trust the target shell.
    TargetPrompted,
    /// The tail command was typed.
    Fetching,
    /// Rows collected.
    Done,
    /// A step failed.
    Error,
    /// Tearing the session down.
    Closing,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::ProxyConnecting => "PROXY_CONNECTING",
            Self::ProxyReady => "PROXY_READY",
            Self::TargetConnecting => "TARGET_CONNECTING",
            Self::TargetReady => "TARGET_READY",
            Self::TargetPrompted => "TARGET_PROMPTED",
            Self::Fetching => "FETCHING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
            Self::Closing => "CLOSING",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Result of one nested fetch plus the states it went through.
#[derive(Debug)]
pub struct NestedOutcome {
    /// Usage rows, or the failure.
    pub result: Result<Vec<String>, MonitorError>,
    /// Every state entered, in order.
    pub trace: Vec<DriverState>,
}

/// Drives one nested fetch. Consumed by [`NestedDriver::run`].
pub struct NestedDriver<'a, O> {
    opener: &'a O,
    settings: &'a MonitorSettings,
    cancel: Arc<AtomicBool>,
    trace: Vec<DriverState>,
}

impl<'a, O: SessionOpener> NestedDriver<'a, O> {
    /// Creates a driver in the `Disconnected` state.
    pub fn new(opener: &'a O, settings: &'a MonitorSettings) -> Self {
        Self {
            opener,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            trace: vec![DriverState::Disconnected],
        }
    }

    /// Stops waiting once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.trace
            .last()
            .copied()
            .unwrap_or(DriverState::Disconnected)
    }

    /// Runs the fetch to completion, teardown included. Blocks.
    pub fn run(mut self, proxy: &HostConfig, target: &HostConfig) -> NestedOutcome {
        self.enter(DriverState::ProxyConnecting);
        info!(
            proxy = %proxy.destination(),
            port = proxy.port,
            auth = proxy.auth().label(),
            "Connecting to proxy"
        );

        let result = match self.opener.open(proxy) {
            Ok(session) => {
                let mut term = Terminal::with_poll_interval(session, self.settings.poll_interval)
                    .with_cancel(Arc::clone(&self.cancel));
                let result = self.drive(&mut term, target);
                self.settle(&result);
                self.teardown(&mut term);
                result
            }
            Err(e) => {
                let result = Err(MonitorError::Connection(format!(
                    "Failed to open session to {}: {e}",
                    proxy.hostname
                )));
                self.settle(&result);
                // Nothing was spawned, so there is nothing to tear down.
                self.enter(DriverState::Closing);
                result
            }
        };

        debug!(trace = ?self.trace, "Nested fetch finished");
        NestedOutcome {
            result,
            trace: self.trace,
        }
    }

    fn drive<S: ShellSession>(
        &mut self,
        term: &mut Terminal<S>,
        target: &HostConfig,
    ) -> Result<Vec<String>, MonitorError> {
        let settings = self.settings;

        self.wait_ready(term, "bastion response")?;
        self.enter(DriverState::ProxyReady);

        let login = nested_login_line(target, &settings.ssh);
        info!(command = %login.display(), "Connecting to target through proxy");
        term.send_line(login.text())?;
        self.enter(DriverState::TargetConnecting);

        self.wait_ready(term, "target connection")?;
        self.enter(DriverState::TargetReady);

        for _ in 1..settings.target_ready_signals {
            self.wait_ready(term, "prompt on the target server")?;
        }
        self.enter(DriverState::TargetPrompted);

        let command = settings.remote_command();
        info!(command = %command, "Requesting usage rows");
        term.send_line(&command)?;
        self.enter(DriverState::Fetching);

        let rows_wanted = settings.tail_lines;
        let capture = term.read_until(settings.data_timeout, |buffer| {
            has_csv_rows(buffer, rows_wanted)
        });
        if capture.end == WaitEnd::Cancelled {
            return Err(cancelled("target CSV output"));
        }
        if !capture.matched() {
            return Err(MonitorError::Command(format!(
                "Timeout waiting for target CSV output. Output so far:\n{}",
                capture.tail(DIAGNOSTIC_CHARS)
            )));
        }

        let rows = extract_rows(&capture.raw, rows_wanted);
        if rows.len() < rows_wanted {
            return Err(MonitorError::Command(format!(
                "Expected at least {rows_wanted} valid CSV lines, found {}: {rows:?}",
                rows.len()
            )));
        }

        debug!(rows = rows.len(), elapsed = ?capture.elapsed, "Usage rows received");
        Ok(rows)
    }

    fn wait_ready<S: ShellSession>(
        &self,
        term: &mut Terminal<S>,
        waiting_for: &str,
    ) -> Result<(), MonitorError> {
        debug!(state = %self.state(), waiting_for, "Waiting for ready signal");
        let capture = term.read_until(self.settings.ready_timeout, is_ready);
        match capture.end {
            WaitEnd::Matched => Ok(()),
            WaitEnd::TimedOut => Err(MonitorError::Connection(format!(
                "Timeout waiting for {waiting_for}. Output so far:\n{}",
                capture.tail(DIAGNOSTIC_CHARS)
            ))),
            WaitEnd::Closed => Err(MonitorError::Connection(format!(
                "Session closed while waiting for {waiting_for}. Output so far:\n{}",
                capture.tail(DIAGNOSTIC_CHARS)
            ))),
            WaitEnd::Cancelled => Err(cancelled(waiting_for)),
        }
    }

    fn settle(&mut self, result: &Result<Vec<String>, MonitorError>) {
        match result {
            Ok(_) => self.enter(DriverState::Done),
            Err(e) => {
                warn!(state = %self.state(), error = %e, "Nested fetch failed");
                self.enter(DriverState::Error);
            }
        }
    }

    fn teardown<S: ShellSession>(&mut self, term: &mut Terminal<S>) {
        self.enter(DriverState::Closing);

        if !term.is_alive() {
            debug!("Session already exited");
            return;
        }

        for shell in ["target", "proxy"] {
            if let Err(e) = term.send_line("exit") {
                warn!(shell, error = %e, "Failed to send exit");
            }
        }

        if let Err(e) = term.terminate(self.settings.teardown_timeout) {
            warn!(error = %e, "Failed to terminate session");
        }
    }

    fn enter(&mut self, state: DriverState) {
        debug!(from = %self.state(), to = %state, "Driver transition");
        self.trace.push(state);
    }
}

fn cancelled(waiting_for: &str) -> MonitorError {
    MonitorError::Connection(format!("Fetch cancelled while waiting for {waiting_for}"))
}

// ============================================================================
// Nested Fetcher
// ============================================================================

/// Sets the flag when dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs [`NestedDriver`] on the blocking pool.
pub struct NestedFetcher<O = PtySessionOpener> {
    opener: Arc<O>,
    settings: Arc<MonitorSettings>,
}

impl NestedFetcher<PtySessionOpener> {
    /// Creates a fetcher that spawns ssh under a PTY.
    pub fn new(settings: MonitorSettings) -> Self {
        let opener = PtySessionOpener::new(settings.ssh.clone());
        Self::with_opener(opener, settings)
    }
}

impl<O: SessionOpener> NestedFetcher<O> {
    /// Creates a fetcher over a custom opener.
    pub fn with_opener(opener: O, settings: MonitorSettings) -> Self {
        Self {
            opener: Arc::new(opener),
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl<O> NestedSource for NestedFetcher<O>
where
    O: SessionOpener + 'static,
{
    #[instrument(skip_all, fields(proxy = %proxy.hostname, target = %target.hostname))]
    async fn fetch_nested(
        &self,
        proxy: &HostConfig,
        target: &HostConfig,
    ) -> Result<Vec<String>, MonitorError> {
        let opener = Arc::clone(&self.opener);
        let settings = Arc::clone(&self.settings);
        let proxy = proxy.clone();
        let target = target.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancel));

        let outcome = tokio::task::spawn_blocking(move || {
            NestedDriver::new(opener.as_ref(), settings.as_ref())
                .with_cancel(cancel)
                .run(&proxy, &target)
        })
        .await
        .map_err(|e| MonitorError::Internal(format!("Nested fetch task failed: {e}")))?;

        outcome.result
    }
}

// ============================================================================
// Tests
// ============================================================================
