// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `usagewatch` Core
//!
//! Core types and models shared by every `usagewatch` crate.
//!
//! ## Key Types
//!
//! ### Inventory
//! - [`HostConfig`] - One SSH endpoint (hostname, port, user, credentials)
//! - [`AuthMethod`] - The resolved way a host authenticates
//! - [`ServerDescriptor`] - A host, optionally with a nested target behind it
//! - [`FetchRoute`] - Direct or nested, derived from a descriptor
//!
//! ### Results
//! - [`UsageRecord`] - Delta-based usage snapshot computed from two log rows
//! - [`UsageReport`] - A record or a single-field failure
//! - [`ServerReport`] - A report tagged with the hostname to display

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{
    // Inventory
    AuthMethod,
    FetchMode,
    FetchRoute,
    HostConfig,
    ServerDescriptor,
    DEFAULT_SSH_PORT,
    // Results
    ServerReport,
    UsageRecord,
    UsageReport,
    TIMESTAMP_FORMAT,
};
