// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # usagewatch Monitor
//!
//! Fetches usage rows from servers and turns them into usage records.
//!
//! ## Fetch Modes
//!
//! - **Direct**: one non-interactive `ssh host 'tail ...'` ([`DirectFetcher`])
//! - **Nested**: an interactive login on a proxy, a second login typed into
//!   it, then the tail command typed into the target shell ([`NestedDriver`])
//!
//! ## Failures
//!
//! [`UsageMonitor::fetch`] never fails. Every error becomes a
//! [`usagewatch_core::UsageReport::Failed`] whose message starts with its
//! category: `Connection failed`, `Command failed`, `Data parsing failed` or
//! `Internal error`.
//!
//! ## Example
//!
//! ```no_run
//! use usagewatch_core::{HostConfig, ServerDescriptor};
//! use usagewatch_monitor::{MonitorSettings, UsageMonitor};
//!
//! # async fn example() {
//! let monitor = UsageMonitor::new(MonitorSettings::default());
//! let server = ServerDescriptor::nested(
//!     HostConfig::new("bastion.example.net", "ops"),
//!     HostConfig::new("10.0.0.7", "app"),
//! );
//! let report = monitor.fetch_server(&server).await;
//! println!("{}: {:?}", report.server, report.report);
//! # }
//! ```

pub mod direct;
pub mod error;
pub mod nested;
pub mod orchestrator;
pub mod parser;
pub mod settings;

#[cfg(test)]
mod parser_edge_tests;

pub use direct::DirectFetcher;
pub use error::MonitorError;
pub use nested::{DriverState, NestedDriver, NestedFetcher, NestedOutcome};
pub use orchestrator::{DirectSource, NestedSource, UsageMonitor};
pub use parser::{extract_number, parse_usage};
pub use settings::MonitorSettings;
