//! Command-line interface for corkscrew
//!
//! Three commands cover the workflow:
//! - `install` - run the full orchestration for a file or folder target
//! - `analyze` - dry-run dependency scan of a binary, no installs
//! - `shortcuts` - list recorded shortcuts across both backends
//!
//! Global flags control logging verbosity and the configuration file.
//! Commands that talk to the environment manager detect it at startup;
//! `analyze` without `--bottle` is purely static and works without one.

pub mod analyze;
pub mod install;
pub mod shortcuts;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Output format for inspection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Parser)]
#[command(
    name = "corkscrew",
    about = "Install Windows applications and games into Wine bottles",
    version,
    author,
    long_about = "Corkscrew orchestrates installs into isolated Wine-compatibility \
                  environments: it classifies the target, prepares the bottle, resolves \
                  and installs runtime dependencies, runs the installer, and records a \
                  launch shortcut."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug-level logging).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to a custom configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a Windows application or game into a bottle.
    Install(install::InstallCommand),

    /// Scan a binary for runtime dependencies without installing.
    Analyze(analyze::AnalyzeCommand),

    /// List recorded shortcuts.
    Shortcuts(shortcuts::ShortcutsCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);
        let config = Config::load(self.config.as_deref())?;
        match self.command {
            Commands::Install(cmd) => cmd.execute(config).await,
            Commands::Analyze(cmd) => cmd.execute(config).await,
            Commands::Shortcuts(cmd) => cmd.execute(config).await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "corkscrew=error"
    } else if verbose {
        "corkscrew=debug"
    } else {
        "corkscrew=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_accepts_bottle_and_kind() {
        let cli = Cli::try_parse_from([
            "corkscrew",
            "install",
            "/data/setup.exe",
            "--bottle",
            "Game",
            "--kind",
            "file",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let cli = Cli::try_parse_from(["corkscrew", "-v", "-q", "shortcuts"]);
        assert!(cli.is_err());
    }
}
