//! The `shortcuts` command

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::gateway::BottlesGateway;
use crate::service::OrchestrationService;

/// List recorded shortcuts.
#[derive(Debug, Args)]
pub struct ShortcutsCommand {
    /// Limit to one bottle and merge in the manager's own registry.
    #[arg(short, long)]
    pub bottle: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ShortcutsCommand {
    /// Print the merged shortcut listing.
    pub async fn execute(self, config: Config) -> Result<()> {
        let gateway = Arc::new(BottlesGateway::detect(Arc::new(config.clone()))?);
        let service = OrchestrationService::new(config, gateway);
        let entries = service.shortcuts().list(self.bottle.as_deref()).await?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
            OutputFormat::Text => {
                if entries.is_empty() {
                    println!("no shortcuts recorded");
                    return Ok(());
                }
                for entry in entries {
                    let target = entry
                        .target
                        .as_ref()
                        .map_or_else(String::new, |t| format!(" -> {}", t.display()));
                    println!(
                        "{}/{} [{}]{}",
                        entry.bottle.bold(),
                        entry.display_name,
                        entry.source.as_str(),
                        target
                    );
                }
            }
        }
        Ok(())
    }
}
