//! Config command - manage the inventory file.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::Path;
use tracing::info;
use usagewatch_core::HostConfig;
use usagewatch_store::{Config, StoreError, default_config_dir};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

const REDACTED: &str = "***";

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration (passwords redacted).
    Show,

    /// Show configuration paths.
    Path,

    /// Write an example inventory.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Check the inventory for mistakes.
    Validate,
}

/// Runs the config command.
pub async fn run(
    args: &ConfigArgs,
    path: &Path,
    loaded: Result<Config, StoreError>,
    cli: &Cli,
) -> Result<()> {
    match &args.action {
        ConfigAction::Path => show_paths(path, cli),
        ConfigAction::Init { force } => init_config(path, *force).await,
        ConfigAction::Show => show_config(&require(loaded, path)?, cli),
        ConfigAction::Validate => validate_config(&require(loaded, path)?, path, cli),
    }
}

fn require(loaded: Result<Config, StoreError>, path: &Path) -> Result<Config> {
    loaded.with_context(|| format!("Failed to load {}", path.display()))
}

fn show_config(config: &Config, cli: &Cli) -> Result<()> {
    let config = redacted(config);
    let general = &config.general;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let t = &general.timeouts;

            println!("usagewatch Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Refresh interval:     {}s", general.refresh_interval);
            println!("Log level:            {}", general.log_level);
            println!("Connect timeout:      {}s", general.connect_timeout);
            println!(
                "Timeouts:             ready {}s, data {}s, direct {}s, teardown {}s",
                t.ready, t.data, t.direct, t.teardown
            );
            println!("Poll interval:        {}ms", t.poll_interval_ms);
            println!("Target ready signals: {}", general.target_ready_signals);
            println!(
                "Remote log:           {} (last {} rows)",
                general.remote_log_path, general.tail_lines
            );
            println!();
            println!("{}", formatter.format_servers_header());
            for (index, server) in config.servers.iter().enumerate() {
                println!("{}", formatter.format_server_line(index, server));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

fn show_paths(path: &Path, cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:     {}", config_dir.display());
            println!("Inventory file: {}", path.display());
            if !path.exists() {
                println!();
                println!("The inventory file does not exist yet; run `usagewatch config init`.");
            }
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "inventory_file": path.display().to_string(),
                "exists": path.exists(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    Config::example().save_to(path).await?;

    info!(path = %path.display(), "Example inventory written");
    println!("Wrote example inventory to {}", path.display());
    println!("Edit the hostnames and credentials, then run `usagewatch config validate`.");

    Ok(())
}

fn validate_config(config: &Config, path: &Path, cli: &Cli) -> Result<()> {
    config.validate()?;

    match cli.format {
        OutputFormat::Text => println!(
            "{} is valid ({} servers)",
            path.display(),
            config.servers.len()
        ),
        OutputFormat::Json => {
            let report = serde_json::json!({
                "path": path.display().to_string(),
                "valid": true,
                "servers": config.servers.len(),
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&report)?);
        }
    }

    Ok(())
}

/// Copy of `config` with every password replaced.
fn redacted(config: &Config) -> Config {
    fn redact(host: &mut HostConfig) {
        if host.password.is_some() {
            host.password = Some(REDACTED.to_string());
        }
    }

    let mut config = config.clone();
    for server in &mut config.servers {
        redact(&mut server.host);
        if let Some(target) = server.nested.as_deref_mut() {
            redact(&mut target.host);
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_every_password() {
        let mut config = Config::example();
        if let Some(target) = config.servers[1].nested.as_deref_mut() {
            target.host.password = Some("inner-secret".into());
        }

        let shown = redacted(&config);
        let json = serde_json::to_string(&shown).unwrap();

        assert!(!json.contains("change-me"));
        assert!(!json.contains("inner-secret"));
        assert_eq!(shown.servers[1].host.password.as_deref(), Some(REDACTED));
        assert!(shown.servers[0].host.password.is_none());
        // Source is untouched.
        assert_eq!(config.servers[1].host.password.as_deref(), Some("change-me"));
    }
}
