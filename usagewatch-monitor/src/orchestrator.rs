//! Routes a server descriptor to the right fetcher and folds every failure
//! into a [`UsageReport`].

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;
use tracing::{info, instrument, warn};
use usagewatch_core::{FetchRoute, HostConfig, ServerDescriptor, ServerReport, UsageRecord, UsageReport};

use crate::direct::DirectFetcher;
use crate::error::MonitorError;
use crate::nested::NestedFetcher;
use crate::parser::parse_usage;
use crate::settings::MonitorSettings;

// ============================================================================
// Sources
// ============================================================================

/// Retrieves usage rows from a directly reachable host.
#[async_trait]
pub trait DirectSource: Send + Sync {
    /// Returns the raw rows printed by the tail command.
    async fn fetch_direct(&self, host: &HostConfig) -> Result<Vec<String>, MonitorError>;
}

/// Retrieves usage rows from a target behind a proxy.
#[async_trait]
pub trait NestedSource: Send + Sync {
    /// Returns the raw rows printed by the tail command on `target`.
    async fn fetch_nested(
        &self,
        proxy: &HostConfig,
        target: &HostConfig,
    ) -> Result<Vec<String>, MonitorError>;
}

// ============================================================================
// Usage Monitor
// ============================================================================

/// Fetches and parses usage for server descriptors.
///
/// Fetches share no state, so any number may run concurrently.
pub struct UsageMonitor<D = DirectFetcher, N = NestedFetcher> {
    direct: D,
    nested: N,
}

impl UsageMonitor {
    /// Creates a monitor over the real ssh fetchers.
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            direct: DirectFetcher::new(&settings),
            nested: NestedFetcher::new(settings),
        }
    }
}

impl<D: DirectSource, N: NestedSource> UsageMonitor<D, N> {
    /// Creates a monitor over custom sources.
    pub fn with_sources(direct: D, nested: N) -> Self {
        Self { direct, nested }
    }

    /// Fetches one server. Never fails: errors become
    /// [`UsageReport::Failed`].
    #[instrument(skip_all, fields(server = %descriptor.display_hostname(), mode = %descriptor.mode()))]
    pub async fn fetch(&self, descriptor: &ServerDescriptor) -> UsageReport {
        let attempt = AssertUnwindSafe(self.try_fetch(descriptor))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(MonitorError::Internal(panic_message(panic.as_ref()))));

        match attempt {
            Ok(record) => {
                info!(last_update = %record.last_update, "Usage fetched");
                UsageReport::Usage(record)
            }
            Err(e) => {
                warn!(category = e.category(), error = %e, "Usage fetch failed");
                UsageReport::failed(e.to_string())
            }
        }
    }

    /// Fetches one server, keeping the typed error.
    ///
    /// # Errors
    ///
    /// Returns whichever stage failed: an invalid descriptor is internal,
    /// fetch failures are connection or command failures, and too few rows
    /// is a parse failure.
    pub async fn try_fetch(&self, descriptor: &ServerDescriptor) -> Result<UsageRecord, MonitorError> {
        descriptor.validate()?;

        let lines = match descriptor.route() {
            FetchRoute::Direct(host) => self.direct.fetch_direct(host).await?,
            FetchRoute::Nested { proxy, target } => self.nested.fetch_nested(proxy, target).await?,
        };

        parse_usage(&lines)
    }

    /// Fetches one server and tags the report with its display hostname.
    pub async fn fetch_server(&self, descriptor: &ServerDescriptor) -> ServerReport {
        let report = self.fetch(descriptor).await;
        ServerReport::new(descriptor.display_hostname(), report)
    }

    /// Fetches every server concurrently, preserving order.
    pub async fn fetch_all(&self, descriptors: &[ServerDescriptor]) -> Vec<ServerReport> {
        join_all(descriptors.iter().map(|d| self.fetch_server(d))).await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "fetch panicked".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
