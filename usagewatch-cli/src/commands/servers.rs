//! Servers command - list the inventory.

use anyhow::Result;
use tracing::info;
use usagewatch_core::FetchMode;
use usagewatch_store::Config;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the servers command.
pub fn run(config: &Config, cli: &Cli) -> Result<()> {
    info!(servers = config.servers.len(), "Listing servers");

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_servers_header());
            println!("{}", "─".repeat(78));

            for (index, server) in config.servers.iter().enumerate() {
                println!("{}", formatter.format_server_line(index, server));
            }

            println!();
            println!(
                "Total: {} servers ({} nested)",
                config.servers.len(),
                config
                    .servers
                    .iter()
                    .filter(|s| s.mode() == FetchMode::Nested)
                    .count()
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_servers(&config.servers)?);
        }
    }

    Ok(())
}
