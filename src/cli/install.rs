//! The `install` command

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::gateway::BottlesGateway;
use crate::models::{DeclaredKind, InstallOutcome, InstallRequest};
use crate::service::OrchestrationService;

/// Advisory target-kind hint. The router re-derives the real kind from
/// the filesystem and overrides a conflicting hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// A single installer file
    File,
    /// A pre-extracted application folder
    Folder,
}

/// Install a Windows application or game into a bottle.
#[derive(Debug, Args)]
pub struct InstallCommand {
    /// Path to an installer (.exe, .msi), a disc image (.iso), or an
    /// application folder.
    pub path: PathBuf,

    /// Target bottle name; derived from the path when omitted.
    #[arg(short, long)]
    pub bottle: Option<String>,

    /// Display name for the launch shortcut.
    #[arg(short = 'n', long = "name")]
    pub display_name: Option<String>,

    /// Advisory hint about the target kind.
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
}

impl InstallCommand {
    /// Run the install workflow to completion.
    pub async fn execute(self, config: Config) -> Result<()> {
        let gateway = Arc::new(BottlesGateway::detect(Arc::new(config.clone()))?);
        let service = OrchestrationService::new(config, gateway);

        let mut request = InstallRequest::new(self.path).with_declared_kind(match self.kind {
            Some(KindArg::File) => DeclaredKind::File,
            Some(KindArg::Folder) => DeclaredKind::Folder,
            None => DeclaredKind::Unknown,
        });
        if let Some(bottle) = self.bottle {
            request = request.with_bottle(bottle);
        }
        if let Some(name) = self.display_name {
            request = request.with_display_name(name);
        }
        let bottle = request.bottle_name();

        match service.install(request).await {
            InstallOutcome::Succeeded { shortcut } => {
                println!(
                    "{} installed into bottle '{}'",
                    "✓".green().bold(),
                    bottle.bold()
                );
                if let Some(shortcut) = shortcut {
                    println!(
                        "  shortcut: {} ({})",
                        shortcut.display_name,
                        shortcut.source.as_str()
                    );
                }
                Ok(())
            }
            InstallOutcome::Failed { stage, error } => Err(anyhow::Error::new(error)
                .context(format!("install into '{bottle}' failed at the {stage} stage"))),
        }
    }
}
