//! Usage command - fetch and display server usage.

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};
use usagewatch_core::{ServerDescriptor, ServerReport};
use usagewatch_monitor::UsageMonitor;
use usagewatch_store::{Config, GeneralConfig};

use super::monitor_settings;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Server to query, by inventory index or hostname.
    #[arg(long, short)]
    pub server: Option<String>,

    /// Query every configured server (the default).
    #[arg(long, conflicts_with = "server")]
    pub all: bool,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, config: &Config, cli: &Cli) -> Result<()> {
    config.validate()?;
    let servers = select_servers(args, config)?;

    info!(servers = servers.len(), "Fetching usage");

    let monitor = UsageMonitor::new(monitor_settings(&config.general));
    let reports = monitor.fetch_all(servers).await;

    for report in &reports {
        if let Some(error) = report.report.error() {
            warn!(server = %report.server, error = %error, "Fetch failed");
        }
    }

    println!("{}", render_reports(&reports, &config.general, cli)?);

    let code = ExitCode::for_reports(&reports);
    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }

    Ok(())
}

/// Picks the servers named by the arguments.
fn select_servers<'a>(args: &UsageArgs, config: &'a Config) -> Result<&'a [ServerDescriptor]> {
    if config.servers.is_empty() {
        anyhow::bail!(
            "No servers configured. Run `usagewatch config init` to write an example inventory."
        );
    }

    match &args.server {
        Some(selector) if !args.all => {
            let (_, server) = config.find_server(selector)?;
            Ok(std::slice::from_ref(server))
        }
        _ => Ok(&config.servers),
    }
}

/// Renders reports in the selected output format.
pub fn render_reports(
    reports: &[ServerReport],
    general: &GeneralConfig,
    cli: &Cli,
) -> Result<String> {
    match cli.format {
        OutputFormat::Text => {
            let formatter =
                TextFormatter::new(!cli.no_color).with_stale_after(stale_threshold(general));
            Ok(formatter.format_reports(reports))
        }
        OutputFormat::Json => JsonFormatter::new(cli.pretty).format_reports(reports),
    }
}

/// Rows older than two refresh intervals are flagged as stale.
fn stale_threshold(general: &GeneralConfig) -> Option<chrono::Duration> {
    let secs = general.refresh_interval.checked_mul(2)?;
    chrono::Duration::try_seconds(i64::try_from(secs).ok()?)
}
