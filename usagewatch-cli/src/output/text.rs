//! Text output formatting with colors.

use chrono::{Duration, Local, NaiveDateTime};
use usagewatch_core::{ServerDescriptor, ServerReport, UsageRecord, UsageReport};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    stale_after: Option<Duration>,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            stale_after: None,
        }
    }

    /// Marks records whose last row is older than `threshold`.
    pub fn with_stale_after(mut self, threshold: Option<Duration>) -> Self {
        self.stale_after = threshold;
        self
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Formats every report, separated by blank lines.
    pub fn format_reports(&self, reports: &[ServerReport]) -> String {
        self.format_reports_at(reports, Local::now().naive_local())
    }

    /// Formats every report, judging staleness against `now`.
    pub fn format_reports_at(&self, reports: &[ServerReport], now: NaiveDateTime) -> String {
        reports
            .iter()
            .map(|r| self.format_report_at(r, now))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn format_report_at(&self, report: &ServerReport, now: NaiveDateTime) -> String {
        match &report.report {
            UsageReport::Usage(record) => self.format_record(&report.server, record, now),
            UsageReport::Failed { error } => {
                let mut lines = vec![format!("{} {}", self.bold(&report.server), self.red("✗"))];
                lines.extend(error.lines().map(|l| format!("  {}", self.red(l))));
                lines.join("\n")
            }
        }
    }

    fn format_record(&self, server: &str, record: &UsageRecord, now: NaiveDateTime) -> String {
        let mut header = format!(
            "{} {}",
            self.bold(server),
            self.dim(&format!("(updated {})", record.last_update))
        );
        if self
            .stale_after
            .is_some_and(|threshold| record.is_stale(now, threshold))
        {
            header.push(' ');
            header.push_str(&self.yellow("[stale]"));
        }

        let traffic = format!(
            "  Upload:   {:<10} Download: {}",
            format_delta(record.upload_delta),
            format_delta(record.download_delta)
        );

        let shares = format!(
            "  Disk: {}  CPU: {}  RAM: {}",
            self.usage_share(&record.disk),
            self.usage_share(&record.cpu),
            self.usage_share(&record.ram)
        );

        [header, traffic, shares].join("\n")
    }

    fn usage_share(&self, share: &str) -> String {
        match percent_value(share) {
            Some(percent) => self.color_for_usage(percent, share),
            None => share.to_string(),
        }
    }

    // ========================================================================
    // Inventory
    // ========================================================================

    /// Header for the servers list.
    pub fn format_servers_header(&self) -> String {
        self.bold(&format!(
            "{:<4} {:<28} {:<7} {:<28} {}",
            "#", "Server", "Mode", "Via", "Auth"
        ))
    }

    /// One line of the servers list.
    pub fn format_server_line(&self, index: usize, server: &ServerDescriptor) -> String {
        let (via, target) = match server.nested.as_deref() {
            Some(target) => (server.host.hostname.as_str(), &target.host),
            None => ("-", &server.host),
        };
        format!(
            "{:<4} {:<28} {:<7} {:<28} {}",
            index,
            server.display_hostname(),
            server.mode(),
            via,
            self.cyan(target.auth().label())
        )
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    /// Colors a usage share: red from 90%, yellow from 70%.
    pub fn color_for_usage(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent >= 90.0 {
            self.red(text)
        } else if percent >= 70.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Renders a delta with an explicit sign, or `n/a` when it is unknown.
pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(value) => format!("{value:+.1}"),
        None => "n/a".to_string(),
    }
}

/// Reads `"51%"` as 51.0.
fn percent_value(share: &str) -> Option<f64> {
    share.trim().strip_suffix('%')?.trim().parse().ok()
}
