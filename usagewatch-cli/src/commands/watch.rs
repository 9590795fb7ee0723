//! Watch command - periodic usage refresh.

use anyhow::Result;
use clap::Args;
use std::io::{Write, stdout};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::info;
use usagewatch_monitor::UsageMonitor;
use usagewatch_store::Config;

use super::monitor_settings;
use super::usage::render_reports;
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (defaults to `general.refresh_interval`).
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// Minimum interval to use.
    #[arg(long, default_value = "10")]
    pub min_interval: u64,
}

impl WatchArgs {
    fn refresh_interval(&self, config: &Config) -> u64 {
        self.interval
            .unwrap_or(config.general.refresh_interval)
            .max(self.min_interval)
            .max(1)
    }
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, config: &Config, cli: &Cli) -> Result<()> {
    config.validate()?;
    if config.servers.is_empty() {
        anyhow::bail!(
            "No servers configured. Run `usagewatch config init` to write an example inventory."
        );
    }

    let refresh_interval = args.refresh_interval(config);
    info!(interval = refresh_interval, "Starting watch mode");

    let monitor = UsageMonitor::new(monitor_settings(&config.general));
    let mut ticker = interval(Duration::from_secs(refresh_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let reports = tokio::select! {
            reports = monitor.fetch_all(&config.servers) => reports,
            _ = tokio::signal::ctrl_c() => break,
        };
        let rendered = render_reports(&reports, &config.general, cli)?;

        match cli.format {
            OutputFormat::Text => {
                // Clear screen
                print!("\x1b[2J\x1b[H");
                println!(
                    "usagewatch - {} (refresh: {}s)",
                    chrono::Local::now().format("%H:%M:%S"),
                    refresh_interval
                );
                println!("{}", "─".repeat(50));
                println!();
                println!("{rendered}");
                println!();
                println!("Press Ctrl+C to exit");
            }
            OutputFormat::Json => println!("{rendered}"),
        }
        stdout().flush()?;
    }

    info!("Watch mode stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_resolution() {
        let mut config = Config::default();
        config.general.refresh_interval = 45;

        let args = WatchArgs {
            interval: None,
            min_interval: 10,
        };
        assert_eq!(args.refresh_interval(&config), 45);

        let args = WatchArgs {
            interval: Some(3),
            min_interval: 10,
        };
        assert_eq!(args.refresh_interval(&config), 10);

        let args = WatchArgs {
            interval: Some(0),
            min_interval: 0,
        };
        assert_eq!(args.refresh_interval(&config), 1);
    }
}
