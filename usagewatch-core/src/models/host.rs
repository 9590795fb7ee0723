//! Inventory types.
//!
//! A [`ServerDescriptor`] is either a flat [`HostConfig`] (direct mode) or a
//! host carrying a nested target under the reserved `then` key (nested mode):
//!
//! ```json
//! {
//!   "hostname": "bastion.example.net",
//!   "username": "ops",
//!   "then": { "hostname": "10.0.0.7", "port": 5687, "username": "app" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

// ============================================================================
// Host Config
// ============================================================================

/// One SSH endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Hostname or IP address.
    pub hostname: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Private key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_filepath: Option<PathBuf>,
    /// Password, used through `sshpass`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// How a host authenticates once its configuration is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod<'a> {
    /// Private key file passed with `-i`.
    Key(&'a Path),
    /// Password supplied through the `sshpass` wrapper.
    Password(&'a str),
    /// Neither; ssh falls back to the agent and its default identities.
    Agent,
}

impl AuthMethod<'_> {
    /// Short label for listings and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::Password(_) => "password",
            Self::Agent => "agent",
        }
    }
}

impl HostConfig {
    /// Creates a host on the default port with agent authentication.
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            key_filepath: None,
            password: None,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the private key file.
    pub fn with_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_filepath = Some(path.into());
        self
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// `user@host` destination string.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }

    /// Resolves the authentication used when this host is dialed from the
    /// local machine: the key file if it exists here, else the password,
    /// else the agent.
    pub fn auth(&self) -> AuthMethod<'_> {
        if let Some(key) = self.key_filepath.as_deref() {
            if key.exists() {
                return AuthMethod::Key(key);
            }
        }
        match self.password.as_deref() {
            Some(password) => AuthMethod::Password(password),
            None => AuthMethod::Agent,
        }
    }

    /// Checks that the fields needed to dial this host are present.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` for an empty hostname or username,
    /// or a zero port.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.hostname.trim().is_empty() {
            return Err(CoreError::InvalidConfig("hostname is empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "username is empty for {}",
                self.hostname
            )));
        }
        if self.port == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "port 0 is not valid for {}",
                self.hostname
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("key_filepath", &self.key_filepath)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============================================================================
// Server Descriptor
// ============================================================================

/// A configured server: a host, optionally hopping to a nested target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// The host dialed first (the only host in direct mode).
    #[serde(flatten)]
    pub host: HostConfig,
    /// Nested target reached through `host`.
    #[serde(rename = "then", default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<Box<ServerDescriptor>>,
}

/// Whether a fetch goes straight to the host or through a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Single non-interactive ssh command.
    Direct,
    /// Interactive session on a proxy, then a nested shell on the target.
    Nested,
}

impl FetchMode {
    /// Returns the display name for this mode.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Nested => "nested",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The hosts a fetch dials, split out of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRoute<'a> {
    /// Dial this host directly.
    Direct(&'a HostConfig),
    /// Dial `proxy`, then open a nested shell on `target`.
    Nested {
        /// First hop.
        proxy: &'a HostConfig,
        /// Terminal target.
        target: &'a HostConfig,
    },
}

impl ServerDescriptor {
    /// Creates a direct-mode descriptor.
    pub fn direct(host: HostConfig) -> Self {
        Self { host, nested: None }
    }

    /// Creates a nested-mode descriptor.
    pub fn nested(proxy: HostConfig, target: HostConfig) -> Self {
        Self {
            host: proxy,
            nested: Some(Box::new(Self::direct(target))),
        }
    }

    /// Presence of the nested target selects nested mode.
    pub fn mode(&self) -> FetchMode {
        if self.nested.is_some() {
            FetchMode::Nested
        } else {
            FetchMode::Direct
        }
    }

    /// Splits the descriptor into the hosts to dial.
    pub fn route(&self) -> FetchRoute<'_> {
        match self.nested.as_deref() {
            Some(target) => FetchRoute::Nested {
                proxy: &self.host,
                target: &target.host,
            },
            None => FetchRoute::Direct(&self.host),
        }
    }

    /// Hostname shown next to this server's result: the nested target's
    /// when nesting, else the host's own.
    pub fn display_hostname(&self) -> &str {
        match self.route() {
            FetchRoute::Direct(host) => &host.hostname,
            FetchRoute::Nested { target, .. } => &target.hostname,
        }
    }

    /// Validates both hops.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` when a hop is invalid or when the
    /// nested target declares a further hop.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.host.validate()?;
        if let Some(target) = self.nested.as_deref() {
            target.host.validate()?;
            if target.nested.is_some() {
                return Err(CoreError::InvalidConfig(format!(
                    "{} declares more than one hop; only a single proxy is supported",
                    self.host.hostname
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_direct() {
        let desc = ServerDescriptor::direct(HostConfig::new("web1", "ops"));
        assert_eq!(desc.mode(), FetchMode::Direct);
        assert!(matches!(desc.route(), FetchRoute::Direct(h) if h.hostname == "web1"));
        assert_eq!(desc.display_hostname(), "web1");
    }

    #[test]
    fn test_route_nested() {
        let desc = ServerDescriptor::nested(
            HostConfig::new("bastion", "ops"),
            HostConfig::new("10.0.0.7", "app").with_port(5687),
        );
        assert_eq!(desc.mode(), FetchMode::Nested);
        match desc.route() {
            FetchRoute::Nested { proxy, target } => {
                assert_eq!(proxy.hostname, "bastion");
                assert_eq!(target.hostname, "10.0.0.7");
                assert_eq!(target.port, 5687);
            }
            FetchRoute::Direct(_) => panic!("expected nested route"),
        }
        assert_eq!(desc.display_hostname(), "10.0.0.7");
    }

    #[test]
    fn test_auth_prefers_existing_key() {
        let key = std::env::current_exe().unwrap();
        let host = HostConfig::new("h", "u")
            .with_key(&key)
            .with_password("secret");
        assert_eq!(host.auth(), AuthMethod::Key(&key));
    }

    #[test]
    fn test_auth_missing_key_falls_back_to_password() {
        let host = HostConfig::new("h", "u")
            .with_key("/definitely/not/a/key_12345")
            .with_password("secret");
        assert_eq!(host.auth(), AuthMethod::Password("secret"));
    }

    #[test]
    fn test_auth_agent() {
        let host = HostConfig::new("h", "u");
        assert_eq!(host.auth(), AuthMethod::Agent);
        assert_eq!(host.auth().label(), "agent");
    }

    #[test]
    fn test_debug_redacts_password() {
        let host = HostConfig::new("h", "u").with_password("hunter2");
        let debug = format!("{host:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(HostConfig::new("", "u").validate().is_err());
        assert!(HostConfig::new("h", " ").validate().is_err());
        assert!(HostConfig::new("h", "u").with_port(0).validate().is_err());
        assert!(HostConfig::new("h", "u").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_second_hop() {
        let mut desc = ServerDescriptor::nested(
            HostConfig::new("bastion", "ops"),
            HostConfig::new("inner", "app"),
        );
        assert!(desc.validate().is_ok());

        if let Some(target) = desc.nested.as_deref_mut() {
            target.nested = Some(Box::new(ServerDescriptor::direct(HostConfig::new(
                "deeper", "app",
            ))));
        }
        assert!(desc.validate().is_err());
    }
}
