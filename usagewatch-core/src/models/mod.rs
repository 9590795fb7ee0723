//! Domain models for `usagewatch`.
//!
//! ## Submodules
//!
//! - [`host`] - Inventory types (HostConfig, ServerDescriptor, FetchRoute)
//! - [`usage`] - Usage types (UsageRecord, UsageReport, ServerReport)

mod host;
mod usage;

pub use host::{
    AuthMethod, FetchMode, FetchRoute, HostConfig, ServerDescriptor, DEFAULT_SSH_PORT,
};
pub use usage::{ServerReport, UsageRecord, UsageReport, TIMESTAMP_FORMAT};
