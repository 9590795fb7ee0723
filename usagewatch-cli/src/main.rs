// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! usagewatch CLI - agentless server usage polling from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show usage for every configured server
//! usagewatch
//!
//! # One server, by inventory index or hostname
//! usagewatch usage --server 1
//! usagewatch usage --server 10.0.0.7
//!
//! # JSON output
//! usagewatch --format json --pretty
//!
//! # List the inventory
//! usagewatch servers
//!
//! # Watch mode
//! usagewatch watch --interval 30
//!
//! # Write a starter inventory
//! usagewatch config init
//! ```

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use usagewatch_core::ServerReport;
use usagewatch_store::{Config, GeneralConfig};

use commands::{config, servers, usage, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// usagewatch CLI - agentless server usage polling.
#[derive(Parser)]
#[command(name = "usagewatch")]
#[command(about = "Agentless server usage polling over SSH")]
#[command(long_about = r"
usagewatch reads the tail of a usage log on each configured server over SSH,
either directly or through a bastion host, and reports the latest disk, CPU
and RAM figures along with upload/download deltas.

Examples:
  usagewatch                         # All servers
  usagewatch usage --server 0        # Single server by index
  usagewatch --format json           # JSON output
  usagewatch servers                 # List the inventory
  usagewatch watch --interval 30     # Refresh periodically
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Inventory file (JSON, or YAML by extension).
    #[arg(long, short = 'c', env = "USAGEWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// List configured servers.
    #[command(visible_alias = "s")]
    Servers,

    /// Refresh usage periodically.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every server reported usage.
    Success = 0,
    /// General error, or at least one server failed.
    Error = 1,
    /// Every server failed.
    AllFailed = 2,
}

impl ExitCode {
    /// Exit code for a round of fetches.
    pub fn for_reports(reports: &[ServerReport]) -> Self {
        let failed = reports.iter().filter(|r| !r.report.is_ok()).count();
        if failed == 0 {
            Self::Success
        } else if failed == reports.len() {
            Self::AllFailed
        } else {
            Self::Error
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, log_level: &str) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("usagewatch=debug,info")
        } else {
            EnvFilter::new(format!("usagewatch={log_level}"))
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let loaded = Config::load_from(&config_path).await;

    let fallback = GeneralConfig::default();
    let log_level = loaded
        .as_ref()
        .map_or(fallback.log_level.as_str(), |c| c.general.log_level.as_str());
    setup_logging(cli.verbose, cli.quiet, log_level);

    let result = match &cli.command {
        Some(Commands::Config(args)) => config::run(args, &config_path, loaded, &cli).await,
        command => match loaded
            .with_context(|| format!("Failed to load {}", config_path.display()))
        {
            Ok(config) => match command {
                Some(Commands::Servers) => servers::run(&config, &cli),
                Some(Commands::Watch(args)) => watch::run(args, &config, &cli).await,
                Some(Commands::Usage(args)) => usage::run(args, &config, &cli).await,
                // Default to usage command
                _ => usage::run(&usage::UsageArgs::default(), &config, &cli).await,
            },
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::Error as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use usagewatch_core::UsageReport;

    fn ok_report(server: &str) -> ServerReport {
        ServerReport::new(
            server,
            UsageReport::Usage(usagewatch_core::UsageRecord {
                last_update: "2024-01-01 00:01:00".into(),
                upload_delta: Some(1.0),
                download_delta: Some(2.0),
                disk: "1%".into(),
                cpu: "2%".into(),
                ram: "3%".into(),
            }),
        )
    }

    #[test]
    fn test_exit_code_for_reports() {
        let failed = ServerReport::new("b", UsageReport::failed("Internal error: x"));

        assert_eq!(ExitCode::for_reports(&[ok_report("a")]), ExitCode::Success);
        assert_eq!(
            ExitCode::for_reports(&[ok_report("a"), failed.clone()]),
            ExitCode::Error
        );
        assert_eq!(ExitCode::for_reports(&[failed]), ExitCode::AllFailed);
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "usagewatch",
            "usage",
            "--server",
            "1",
            "--format",
            "json",
            "--config",
            "/tmp/servers.yaml",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/servers.yaml")));
        match cli.command {
            Some(Commands::Usage(args)) => assert_eq!(args.server.as_deref(), Some("1")),
            _ => panic!("expected usage command"),
        }
    }

    #[test]
    fn test_server_and_all_conflict() {
        let result = Cli::try_parse_from(["usagewatch", "usage", "--server", "0", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
