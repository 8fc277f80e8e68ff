//! Environment manager command detection
//!
//! The manager can be installed either as a Flatpak (every tool runs
//! through `flatpak run --command=...`) or natively on PATH. Detection
//! runs once at gateway construction; the resulting command-line prefixes
//! are immutable afterwards.

use std::process::Command;

use crate::core::CorkscrewError;

/// Flatpak application id of the environment manager.
pub const FLATPAK_APP: &str = "com.usebottles.bottles";

const NATIVE_COMMANDS: &[&str] = &["bottles-cli", "wine", "winetricks"];

/// How the manager is installed on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerFlavor {
    /// Sandboxed install; every command runs through the Flatpak wrapper
    Flatpak,
    /// Tools directly on PATH
    Native,
}

/// Detected command-line prefixes for each manager tool.
#[derive(Debug, Clone)]
pub struct ManagerCommands {
    /// The manager CLI itself
    pub bottles_cli: Vec<String>,
    /// The compatibility runtime launcher
    pub wine: Vec<String>,
    /// The component installer
    pub winetricks: Vec<String>,
    /// How these commands were found
    pub flavor: ManagerFlavor,
}

impl ManagerCommands {
    fn flatpak() -> Self {
        Self {
            bottles_cli: flatpak_wrapped("bottles-cli"),
            wine: flatpak_wrapped("wine"),
            winetricks: flatpak_wrapped("winetricks"),
            flavor: ManagerFlavor::Flatpak,
        }
    }

    fn native() -> Self {
        Self {
            bottles_cli: vec!["bottles-cli".to_string()],
            wine: vec!["wine".to_string()],
            winetricks: vec!["winetricks".to_string()],
            flavor: ManagerFlavor::Native,
        }
    }
}

fn flatpak_wrapped(command: &str) -> Vec<String> {
    vec![
        "flatpak".to_string(),
        "run".to_string(),
        format!("--command={command}"),
        FLATPAK_APP.to_string(),
    ]
}

/// Detect the manager installation, preferring the Flatpak.
pub fn detect() -> Result<ManagerCommands, CorkscrewError> {
    if flatpak_has_manager() {
        tracing::debug!(target: "gateway", "using Flatpak manager installation");
        return Ok(ManagerCommands::flatpak());
    }
    if NATIVE_COMMANDS.iter().all(|c| which::which(c).is_ok()) {
        tracing::debug!(target: "gateway", "using native manager installation");
        return Ok(ManagerCommands::native());
    }
    Err(CorkscrewError::ManagerNotFound)
}

fn flatpak_has_manager() -> bool {
    Command::new("flatpak")
        .args(["list", "--app", "--columns=application"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(FLATPAK_APP))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatpak_commands_carry_the_wrapper() {
        let commands = ManagerCommands::flatpak();
        assert_eq!(commands.bottles_cli[0], "flatpak");
        assert!(commands.wine.contains(&"--command=wine".to_string()));
        assert_eq!(commands.flavor, ManagerFlavor::Flatpak);
    }

    #[test]
    fn native_commands_are_bare() {
        let commands = ManagerCommands::native();
        assert_eq!(commands.bottles_cli, vec!["bottles-cli"]);
        assert_eq!(commands.flavor, ManagerFlavor::Native);
    }
}
