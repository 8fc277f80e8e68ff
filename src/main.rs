//! Corkscrew CLI entry point
//!
//! Parses command-line arguments, runs the selected command, and renders
//! failures as user-friendly errors with suggestions.

use anyhow::Result;
use clap::Parser;
use corkscrew::cli;
use corkscrew::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let context = user_friendly_error(e);
            context.display();
            std::process::exit(1);
        }
    }
}
