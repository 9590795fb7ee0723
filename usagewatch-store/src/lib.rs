// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # usagewatch Store
//!
//! Server inventory and settings for usagewatch.
//!
//! - **Config**: inventory plus general settings, JSON or YAML
//! - **Persistence**: default paths and owner-only file writes
//!
//! ## Usage
//!
//! ```ignore
//! use usagewatch_store::Config;
//!
//! let config = Config::load().await?;
//! config.validate()?;
//! for server in &config.servers {
//!     println!("{} ({})", server.display_hostname(), server.mode());
//! }
//! ```

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{Config, ConfigFormat, GeneralConfig, TimeoutConfig};
pub use error::StoreError;
pub use persistence::{default_config_dir, default_config_path, ensure_dir, load_text, save_private};
