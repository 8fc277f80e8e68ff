//! Manual shortcut sidecar store
//!
//! The folder installer cannot rely on the environment manager's own
//! shortcut registry, so its shortcuts live in a structured TOML sidecar
//! keyed by bottle name. The file is human-readable and rewritten
//! atomically (write-then-rename), so it stays parseable even if the
//! process dies mid-write.
//!
//! ```toml
//! [[shortcut]]
//! bottle = "MyGame"
//! name = "My Game"
//! target = "/data/bottles/MyGame/drive_c/MyGame/game.exe"
//! created_at = "2026-08-06T12:00:00Z"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::CorkscrewError;
use crate::utils::fs::atomic_write_string;

/// One manual shortcut record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarRecord {
    /// The bottle the target lives in
    pub bottle: String,
    /// User-visible shortcut name
    pub name: String,
    /// Absolute path of the launched executable
    pub target: PathBuf,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SidecarFile {
    #[serde(default, rename = "shortcut")]
    shortcuts: Vec<SidecarRecord>,
}

/// File-backed store for manual shortcut records.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    path: PathBuf,
}

impl SidecarStore {
    /// A store backed by the file at `path`. The file is created on the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The sidecar file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<SidecarRecord>, CorkscrewError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let file: SidecarFile = toml::from_str(&content)?;
        Ok(file.shortcuts)
    }

    /// Find the record for a (bottle, name) pair. Name matching is
    /// case-insensitive, mirroring the native backend.
    pub fn find(
        &self,
        bottle: &str,
        name: &str,
    ) -> Result<Option<SidecarRecord>, CorkscrewError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|r| r.bottle == bottle && r.name.eq_ignore_ascii_case(name)))
    }

    /// Insert or replace the record for its (bottle, name) pair.
    pub fn upsert(&self, record: SidecarRecord) -> Result<(), CorkscrewError> {
        let mut records = self.load()?;
        records.retain(|r| !(r.bottle == record.bottle && r.name.eq_ignore_ascii_case(&record.name)));
        records.push(record);
        self.save(&records)
    }

    /// Remove the record for a (bottle, name) pair, reporting whether one
    /// existed.
    pub fn remove(&self, bottle: &str, name: &str) -> Result<bool, CorkscrewError> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| !(r.bottle == bottle && r.name.eq_ignore_ascii_case(name)));
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }

    fn save(&self, records: &[SidecarRecord]) -> Result<(), CorkscrewError> {
        let file = SidecarFile {
            shortcuts: records.to_vec(),
        };
        let content = toml::to_string_pretty(&file)?;
        atomic_write_string(&self.path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(bottle: &str, name: &str) -> SidecarRecord {
        SidecarRecord {
            bottle: bottle.to_string(),
            name: name.to_string(),
            target: PathBuf::from(format!("/prefix/{bottle}/drive_c/{name}.exe")),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path().join("shortcuts.toml"));
        assert!(store.load().unwrap().is_empty());
        assert!(store.find("b", "n").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_by_key_case_insensitively() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path().join("shortcuts.toml"));

        store.upsert(record("Game", "Launcher")).unwrap();
        store.upsert(record("Game", "LAUNCHER")).unwrap();
        store.upsert(record("Other", "Launcher")).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(store.find("Game", "launcher").unwrap().is_some());
    }

    #[test]
    fn records_survive_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.toml");
        SidecarStore::new(&path).upsert(record("Game", "My Game")).unwrap();

        let reloaded = SidecarStore::new(&path).find("Game", "My Game").unwrap().unwrap();
        assert!(reloaded.target.ends_with("My Game.exe"));
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempdir().unwrap();
        let store = SidecarStore::new(dir.path().join("shortcuts.toml"));
        store.upsert(record("Game", "X")).unwrap();
        assert!(store.remove("Game", "x").unwrap());
        assert!(!store.remove("Game", "x").unwrap());
    }

    #[test]
    fn file_is_valid_toml_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.toml");
        SidecarStore::new(&path).upsert(record("Game", "My Game")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[[shortcut]]"));
        assert!(toml::from_str::<toml::Value>(&content).is_ok());
    }
}
