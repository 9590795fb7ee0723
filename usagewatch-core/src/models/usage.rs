//! Usage-related types.
//!
//! - [`UsageRecord`] - Delta snapshot computed from the last two log rows
//! - [`UsageReport`] - A record, or `{ "error": "..." }`
//! - [`ServerReport`] - A report tagged with the hostname to display

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout of the first column of a usage row.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Usage Record
// ============================================================================

/// Usage snapshot derived from two consecutive log rows (previous, last).
///
/// Deltas are `None` when either row's numeric value could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Timestamp of the last row, verbatim.
    pub last_update: String,
    /// Upload counter difference between the two rows.
    #[serde(rename = "upload")]
    pub upload_delta: Option<f64>,
    /// Download counter difference between the two rows.
    #[serde(rename = "download")]
    pub download_delta: Option<f64>,
    /// Disk share of the last row, verbatim.
    pub disk: String,
    /// CPU share of the last row, verbatim.
    pub cpu: String,
    /// RAM share of the last row, verbatim.
    pub ram: String,
}

impl UsageRecord {
    /// Parses `last_update` as a local timestamp.
    pub fn last_update_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.last_update, TIMESTAMP_FORMAT).ok()
    }

    /// Returns true if the last row is older than `threshold` relative to `now`.
    ///
    /// A timestamp that does not parse counts as stale.
    pub fn is_stale(&self, now: NaiveDateTime, threshold: Duration) -> bool {
        self.last_update_at()
            .is_none_or(|at| now.signed_duration_since(at) > threshold)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of one fetch: a record or a single-field failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsageReport {
    /// Fetch and parse succeeded.
    Usage(UsageRecord),
    /// Any stage failed.
    Failed {
        /// Human-readable `"<Category> failed: <detail>"` message.
        error: String,
    },
}

impl UsageReport {
    /// Creates a failure report.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Returns the record on success.
    pub fn record(&self) -> Option<&UsageRecord> {
        match self {
            Self::Usage(record) => Some(record),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the error message on failure.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Usage(_) => None,
            Self::Failed { error } => Some(error),
        }
    }

    /// Returns true on success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

impl From<UsageRecord> for UsageReport {
    fn from(record: UsageRecord) -> Self {
        Self::Usage(record)
    }
}

/// A report tagged with the hostname to display for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerReport {
    /// The record fields, or `error`.
    #[serde(flatten)]
    pub report: UsageReport,
    /// Display hostname.
    pub server: String,
}

impl ServerReport {
    /// Tags a report with a display hostname.
    pub fn new(server: impl Into<String>, report: UsageReport) -> Self {
        Self {
            report,
            server: server.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(last_update: &str) -> UsageRecord {
        UsageRecord {
            last_update: last_update.to_string(),
            upload_delta: Some(5.0),
            download_delta: None,
            disk: "51%".to_string(),
            cpu: "4%".to_string(),
            ram: "41%".to_string(),
        }
    }

    #[test]
    fn test_last_update_at() {
        let rec = record("2024-01-01 00:01:00");
        let at = rec.last_update_at().unwrap();
        assert_eq!(at.format(TIMESTAMP_FORMAT).to_string(), "2024-01-01 00:01:00");
        assert!(record("yesterday").last_update_at().is_none());
    }

    #[test]
    fn test_is_stale() {
        let rec = record("2024-01-01 00:01:00");
        let now = NaiveDateTime::parse_from_str("2024-01-01 00:03:00", TIMESTAMP_FORMAT).unwrap();
        assert!(rec.is_stale(now, Duration::minutes(1)));
        assert!(!rec.is_stale(now, Duration::minutes(5)));
        assert!(record("garbage").is_stale(now, Duration::days(365)));
    }

    #[test]
    fn test_report_accessors() {
        let ok = UsageReport::from(record("2024-01-01 00:01:00"));
        assert!(ok.is_ok());
        assert!(ok.record().is_some());
        assert!(ok.error().is_none());

        let failed = UsageReport::failed("Connection failed: refused");
        assert!(!failed.is_ok());
        assert_eq!(failed.error(), Some("Connection failed: refused"));
    }
}
