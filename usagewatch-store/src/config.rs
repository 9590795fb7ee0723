//! Configuration management.
//!
//! One file holds the server inventory and the general settings. The
//! format follows the extension: `.yaml`/`.yml` is YAML, anything else JSON.
//!
//! ```json
//! {
//!   "general": { "refresh_interval": 60 },
//!   "servers": [
//!     { "hostname": "web1.example.net", "username": "ops", "key_filepath": "~/.ssh/id_ed25519" },
//!     {
//!       "hostname": "bastion.example.net", "username": "ops", "password": "...",
//!       "then": { "hostname": "10.0.0.7", "port": 5687, "username": "app" }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use usagewatch_core::{HostConfig, ServerDescriptor};

use crate::error::StoreError;
use crate::persistence::{default_config_path, load_text, save_private};

/// Accepted `log_level` values.
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

// ============================================================================
// Config Types
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Servers to poll, in display order.
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Refresh interval in seconds for `watch`.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Console log level for usagewatch crates.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// ssh `ConnectTimeout` in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Wait limits for each fetch phase.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Ready signals accepted after the nested login before the target shell
    /// is trusted. Depends on how many banners the target prints.
    #[serde(default = "default_target_ready_signals")]
    pub target_ready_signals: usize,
    /// Usage log path on the target.
    #[serde(default = "default_remote_log_path")]
    pub remote_log_path: String,
    /// Rows requested from the usage log.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

/// Fetch phase timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds to wait for each shell-ready signal.
    pub ready: u64,
    /// Seconds to wait for the usage rows.
    pub data: u64,
    /// Seconds for a whole direct fetch.
    pub direct: u64,
    /// Seconds to wait for the session to exit on teardown.
    pub teardown: u64,
    /// Milliseconds per terminal poll.
    pub poll_interval_ms: u64,
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_target_ready_signals() -> usize {
    2
}

fn default_remote_log_path() -> String {
    "~/usage.csv".to_string()
}

fn default_tail_lines() -> usize {
    2
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            log_level: default_log_level(),
            connect_timeout: default_connect_timeout(),
            timeouts: TimeoutConfig::default(),
            target_ready_signals: default_target_ready_signals(),
            remote_log_path: default_remote_log_path(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ready: 30,
            data: 60,
            direct: 15,
            teardown: 5,
            poll_interval_ms: 100,
        }
    }
}

impl TimeoutConfig {
    /// Ready timeout.
    pub fn ready(&self) -> Duration {
        Duration::from_secs(self.ready)
    }

    /// Data timeout.
    pub fn data(&self) -> Duration {
        Duration::from_secs(self.data)
    }

    /// Direct fetch timeout.
    pub fn direct(&self) -> Duration {
        Duration::from_secs(self.direct)
    }

    /// Teardown wait.
    pub fn teardown(&self) -> Duration {
        Duration::from_secs(self.teardown)
    }

    /// Poll slice.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ============================================================================
// File Format
// ============================================================================

/// On-disk format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }

    fn parse(self, content: &str) -> Result<Config, StoreError> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
        })
    }

    fn render(self, config: &Config) -> Result<String, StoreError> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(config)?,
            Self::Yaml => serde_yaml::to_string(config)?,
        })
    }
}

// ============================================================================
// Loading and Saving
// ============================================================================

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub async fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path()).await
    }

    /// Loads configuration from a specific path. A missing file yields the
    /// defaults with an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = load_text(path).await?;
        let config = ConfigFormat::from_path(path).parse(&content)?;

        info!(path = %path.display(), servers = config.servers.len(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path, owner-only.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let content = ConfigFormat::from_path(path).render(self)?;
        save_private(path, &content).await?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// A starter inventory with one direct and one nested server.
    pub fn example() -> Self {
        Self {
            general: GeneralConfig::default(),
            servers: vec![
                ServerDescriptor::direct(
                    HostConfig::new("web1.example.net", "ops").with_key("~/.ssh/id_ed25519"),
                ),
                ServerDescriptor::nested(
                    HostConfig::new("bastion.example.net", "ops").with_password("change-me"),
                    HostConfig::new("10.0.0.7", "app").with_port(5687),
                ),
            ],
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks settings and every server.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` naming the first problem found.
    pub fn validate(&self) -> Result<(), StoreError> {
        let general = &self.general;
        if general.refresh_interval == 0 {
            return Err(StoreError::Config("refresh_interval must be positive".into()));
        }
        if general.target_ready_signals == 0 {
            return Err(StoreError::Config(
                "target_ready_signals must be at least 1".into(),
            ));
        }
        if general.tail_lines < 2 {
            return Err(StoreError::Config(
                "tail_lines must be at least 2 to compute a delta".into(),
            ));
        }
        if !LOG_LEVELS.contains(&general.log_level.to_ascii_lowercase().as_str()) {
            return Err(StoreError::Config(format!(
                "log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                general.log_level
            )));
        }
        if general.remote_log_path.trim().is_empty() {
            return Err(StoreError::Config("remote_log_path is empty".into()));
        }

        let t = &general.timeouts;
        for (name, value) in [
            ("ready", t.ready),
            ("data", t.data),
            ("direct", t.direct),
            ("teardown", t.teardown),
            ("poll_interval_ms", t.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(StoreError::Config(format!("timeouts.{name} must be positive")));
            }
        }

        for (index, server) in self.servers.iter().enumerate() {
            server
                .validate()
                .map_err(|e| StoreError::Config(format!("server {index}: {e}")))?;
        }
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Returns the server at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ServerNotFound` if the index is out of range.
    pub fn server(&self, index: usize) -> Result<&ServerDescriptor, StoreError> {
        self.servers.get(index).ok_or_else(|| {
            StoreError::ServerNotFound(format!(
                "index {index} is out of range ({} servers configured)",
                self.servers.len()
            ))
        })
    }

    /// Finds a server by index or display hostname.
    ///
    /// A selector that parses as a number is an index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ServerNotFound` if nothing matches.
    pub fn find_server(&self, selector: &str) -> Result<(usize, &ServerDescriptor), StoreError> {
        if let Ok(index) = selector.parse::<usize>() {
            return self.server(index).map(|s| (index, s));
        }
        self.servers
            .iter()
            .enumerate()
            .find(|(_, s)| s.display_hostname() == selector || s.host.hostname == selector)
            .ok_or_else(|| StoreError::ServerNotFound(selector.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
