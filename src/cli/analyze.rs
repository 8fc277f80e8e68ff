//! The `analyze` command

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::gateway::BottlesGateway;
use crate::models::{DependencyReport, Provenance};
use crate::resolver::DependencyResolver;
use crate::service::OrchestrationService;

/// Scan a binary for runtime dependencies without installing anything.
#[derive(Debug, Args)]
pub struct AnalyzeCommand {
    /// Path to the Windows binary to scan.
    pub binary: PathBuf,

    /// Probe inside this bottle when the static scan finds nothing.
    /// Without it the scan is purely static and needs no manager.
    #[arg(short, long)]
    pub bottle: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl AnalyzeCommand {
    /// Produce and print the dependency report.
    pub async fn execute(self, config: Config) -> Result<()> {
        let report = match &self.bottle {
            None => DependencyResolver::new().resolve(&self.binary).await?,
            Some(bottle) => {
                let gateway = Arc::new(BottlesGateway::detect(Arc::new(config.clone()))?);
                let service = OrchestrationService::new(config, gateway);
                service.analyze(&self.binary, Some(bottle)).await?
            }
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_report(&report),
        }
        Ok(())
    }
}

fn print_report(report: &DependencyReport) {
    println!(
        "{} {}",
        "binary:".bold(),
        report.binary_path.display()
    );
    println!(
        "{} {}",
        "detected imports:".bold(),
        report.detected_imports.len()
    );

    let must_install: Vec<_> = report.must_install().collect();
    if must_install.is_empty() {
        println!("{}", "no components need installing".green());
    } else {
        println!("{}", "components to install:".bold());
        for component in must_install {
            println!("  - {}", component.id);
        }
    }

    let builtin: Vec<_> = report
        .resolved_components
        .iter()
        .filter(|c| c.provided_by == Provenance::BaseRuntime)
        .collect();
    if !builtin.is_empty() {
        println!("{}", "provided by the base runtime:".bold());
        for component in builtin {
            println!("  - {}", component.id);
        }
    }

    if !report.unresolved_imports.is_empty() {
        println!("{}", "unresolved imports (ignored):".yellow());
        for import in &report.unresolved_imports {
            println!("  - {import}");
        }
    }
}
