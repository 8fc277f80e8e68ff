//! Configuration for corkscrew
//!
//! One immutable [`Config`] value is built at startup and injected into
//! the gateway and the orchestration service. Nothing in the core reads
//! process-wide mutable state after construction.
//!
//! # Configuration File (`~/.config/corkscrew/config.toml`)
//!
//! All fields are optional; unset fields take their defaults.
//!
//! ```toml
//! # Where the environment manager stores bottle prefixes
//! prefix_base = "/home/user/.local/share/bottles/bottles"
//!
//! # Where corkscrew keeps its own state (shortcut sidecar, leases, staging)
//! data_dir = "/home/user/.local/share/corkscrew"
//!
//! # Components seeded into freshly created bottles before scanning
//! baseline_components = ["dxvk", "vcrun2019", "d3dx9"]
//!
//! [timeouts]
//! create_secs = 300
//! component_secs = 600
//! run_secs = 600
//! probe_secs = 10
//! mount_secs = 120
//! shortcut_secs = 30
//! shortcut_poll_secs = 10
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::CorkscrewError;

/// Bounded timeouts for every external manager invocation.
///
/// A hung external process must never occupy an environment's lease
/// indefinitely, so every gateway call carries one of these.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Environment creation (`bottles-cli new`)
    pub create_secs: u64,
    /// Single component install (winetricks verbs can be slow)
    pub component_secs: u64,
    /// Target binary execution
    pub run_secs: u64,
    /// Runtime import probe (the probe kills the target afterwards)
    pub probe_secs: u64,
    /// Disc image extraction
    pub mount_secs: u64,
    /// Native shortcut listing and registration
    pub shortcut_secs: u64,
    /// Polling window for manager auto-created shortcuts
    pub shortcut_poll_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: 300,
            component_secs: 600,
            run_secs: 600,
            probe_secs: 10,
            mount_secs: 120,
            shortcut_secs: 30,
            shortcut_poll_secs: 10,
        }
    }
}

impl Timeouts {
    /// Environment creation timeout.
    pub const fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    /// Component install timeout.
    pub const fn component(&self) -> Duration {
        Duration::from_secs(self.component_secs)
    }

    /// Binary execution timeout.
    pub const fn run(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }

    /// Runtime probe timeout.
    pub const fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    /// Image extraction timeout.
    pub const fn mount(&self) -> Duration {
        Duration::from_secs(self.mount_secs)
    }

    /// Shortcut operation timeout.
    pub const fn shortcut(&self) -> Duration {
        Duration::from_secs(self.shortcut_secs)
    }

    /// Shortcut polling window.
    pub const fn shortcut_poll(&self) -> Duration {
        Duration::from_secs(self.shortcut_poll_secs)
    }
}

/// Immutable runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory where the environment manager stores bottle prefixes
    pub prefix_base: PathBuf,
    /// Directory for corkscrew state: shortcut sidecar, lease files, staging
    pub data_dir: PathBuf,
    /// Components seeded into freshly created bottles before dependency
    /// scanning (the manager's gaming environment expects these)
    pub baseline_components: Vec<String>,
    /// External call timeouts
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        let data_root = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            prefix_base: data_root.join("bottles").join("bottles"),
            data_dir: data_root.join("corkscrew"),
            baseline_components: vec![
                "dxvk".to_string(),
                "vcrun2019".to_string(),
                "d3dx9".to_string(),
            ],
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CorkscrewError> {
        let file = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !file.exists() {
            if path.is_some() {
                return Err(CorkscrewError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", file.display()),
                )));
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&file)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(target: "config", "loaded configuration from {}", file.display());
        Ok(config)
    }

    /// Default config file location (`~/.config/corkscrew/config.toml`).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("corkscrew").join("config.toml"))
    }

    /// Directory holding per-environment lease files.
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join(".locks")
    }

    /// Directory where disc images are staged for extraction.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    /// Path of the shortcut sidecar file.
    pub fn sidecar_path(&self) -> PathBuf {
        self.data_dir.join("shortcuts.toml")
    }

    /// A configuration rooted entirely under `data_dir`, with no baseline
    /// seeding. Used by tests and useful for hermetic setups.
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            prefix_base: data_dir.join("prefixes"),
            data_dir,
            baseline_components: Vec::new(),
            timeouts: Timeouts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.baseline_components.contains(&"dxvk".to_string()));
        assert_eq!(config.timeouts.probe_secs, 10);
        assert!(config.sidecar_path().ends_with("shortcuts.toml"));
    }

    #[test]
    fn load_missing_default_file_falls_back() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.timeouts.create_secs, 300);
    }

    #[test]
    fn load_explicit_missing_file_errors() {
        let dir = tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn partial_file_keeps_defaults_for_unset_fields() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(
            &file,
            "baseline_components = []\n[timeouts]\nrun_secs = 30\n",
        )
        .unwrap();

        let config = Config::load(Some(&file)).unwrap();
        assert!(config.baseline_components.is_empty());
        assert_eq!(config.timeouts.run_secs, 30);
        // Unset fields keep defaults
        assert_eq!(config.timeouts.create_secs, 300);
        assert_eq!(config.prefix_base, Config::default().prefix_base);
    }
}
