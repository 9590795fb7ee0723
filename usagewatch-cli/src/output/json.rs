//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use usagewatch_core::{FetchMode, ServerDescriptor, ServerReport};

// ============================================================================
// Output Types
// ============================================================================

/// One inventory entry, without secrets.
#[derive(Debug, Serialize)]
pub struct ServerEntry {
    pub index: usize,
    pub server: String,
    pub mode: FetchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    pub port: u16,
    pub username: String,
    pub auth: &'static str,
}

impl ServerEntry {
    /// Describes the descriptor at `index`.
    pub fn new(index: usize, server: &ServerDescriptor) -> Self {
        let (via, target) = match server.nested.as_deref() {
            Some(target) => (Some(server.host.hostname.clone()), &target.host),
            None => (None, &server.host),
        };
        Self {
            index,
            server: server.display_hostname().to_string(),
            mode: server.mode(),
            via,
            port: target.port,
            username: target.username.clone(),
            auth: target.auth().label(),
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats usage results. A single result is an object, several an array.
    pub fn format_reports(&self, reports: &[ServerReport]) -> Result<String> {
        match reports {
            [single] => self.format(single),
            _ => self.format(&reports),
        }
    }

    /// Formats the inventory listing.
    pub fn format_servers(&self, servers: &[ServerDescriptor]) -> Result<String> {
        let entries: Vec<ServerEntry> = servers
            .iter()
            .enumerate()
            .map(|(index, server)| ServerEntry::new(index, server))
            .collect();
        self.format(&entries)
    }
}
