//! Usage row parser.
//!
//! Turns retrieved log rows into a [`UsageRecord`]. Rows look like:
//!
//! ```text
//! 2024-01-01 00:01:00,15 KB,8 KB,51%,4%,41%
//! ```
//!
//! The upload and download columns are cumulative counters; the record
//! carries the difference between the last two rows. A counter that cannot
//! be read degrades to a `None` delta instead of failing the record.

use tracing::{debug, warn};
use usagewatch_core::UsageRecord;

use crate::error::MonitorError;

/// Fields a row must split into to be considered at all.
pub const MIN_FIELDS: usize = 6;

/// Rows needed to compute a delta.
pub const MIN_ROWS: usize = 2;

const TIMESTAMP: usize = 0;
const UPLOAD: usize = 1;
const DOWNLOAD: usize = 2;
const DISK: usize = 3;
const CPU: usize = 4;
const RAM: usize = 5;

/// Parses retrieved rows into a usage record.
///
/// Rows with fewer than [`MIN_FIELDS`] comma-separated fields are dropped.
/// The last two survivors are taken as (previous, last).
///
/// # Errors
///
/// Returns `MonitorError::Parse` naming the valid and total counts when
/// fewer than two rows survive.
pub fn parse_usage<S: AsRef<str>>(lines: &[S]) -> Result<UsageRecord, MonitorError> {
    let rows: Vec<Vec<&str>> = lines
        .iter()
        .map(|line| split_fields(line.as_ref()))
        .filter(|fields| fields.len() >= MIN_FIELDS)
        .collect();

    if rows.len() < MIN_ROWS {
        warn!(valid = rows.len(), total = lines.len(), "Too few usage rows");
        return Err(MonitorError::Parse(format!(
            "Insufficient valid CSV data. Found {} valid lines out of {} total lines",
            rows.len(),
            lines.len()
        )));
    }

    let previous = &rows[rows.len() - 2];
    let last = &rows[rows.len() - 1];

    let record = UsageRecord {
        last_update: last[TIMESTAMP].to_string(),
        upload_delta: delta(previous[UPLOAD], last[UPLOAD]),
        download_delta: delta(previous[DOWNLOAD], last[DOWNLOAD]),
        disk: last[DISK].to_string(),
        cpu: last[CPU].to_string(),
        ram: last[RAM].to_string(),
    };

    debug!(
        last_update = %record.last_update,
        upload = ?record.upload_delta,
        download = ?record.download_delta,
        "Parsed usage record"
    );

    Ok(record)
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn delta(previous: &str, last: &str) -> Option<f64> {
    Some(extract_number(last)? - extract_number(previous)?)
}

/// Reads the number out of a sized field such as `"123.45 KB"`.
///
/// The field must hold at least two whitespace-separated tokens and the
/// first must be a plain decimal: ASCII digits with at most one `.`. Signs,
/// exponents and bare numbers without a unit are rejected.
pub fn extract_number(field: &str) -> Option<f64> {
    let mut tokens = field.split_whitespace();
    let number = tokens.next()?;
    tokens.next()?;

    if !is_plain_decimal(number) {
        return None;
    }
    number.parse().ok()
}

fn is_plain_decimal(token: &str) -> bool {
    let mut digits = 0;
    let mut dots = 0;
    for c in token.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

// ============================================================================
// Tests
// ============================================================================
