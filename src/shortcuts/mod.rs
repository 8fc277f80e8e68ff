//! Shortcut management across two persistence backends
//!
//! Installed targets are reachable through exactly one shortcut entry per
//! (bottle, display name) pair, but the entries live in two disjoint
//! stores: the environment manager's own registry (written as a side
//! effect of file-based installs) and the manual TOML sidecar (the folder
//! installer's only mechanism). [`ShortcutManager`] is the single
//! interface both installers use; it knows which backend is authoritative
//! and reconciles them on every write.
//!
//! Reconciliation rules:
//! - A native entry always preempts a manual write for the same key; the
//!   conflict is logged and reported back as non-fatal.
//! - Recording a native entry drops any manual record it supersedes.
//! - Lookups consult the native backend first.
//!
//! The write path serializes per (bottle, display name) key so concurrent
//! installs targeting the same display name cannot race the invariant.

pub mod sidecar;

pub use sidecar::{SidecarRecord, SidecarStore};

use chrono::Utc;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::core::CorkscrewError;
use crate::gateway::EnvironmentGateway;
use crate::models::{ShortcutEntry, ShortcutSource};

/// Manager over the native registry and the manual sidecar.
pub struct ShortcutManager {
    store: SidecarStore,
    gateway: Arc<dyn EnvironmentGateway>,
    key_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl ShortcutManager {
    /// Build a manager writing to the configured sidecar path.
    pub fn new(config: &Config, gateway: Arc<dyn EnvironmentGateway>) -> Self {
        Self {
            store: SidecarStore::new(config.sidecar_path()),
            gateway,
            key_locks: DashMap::new(),
        }
    }

    fn key_lock(&self, bottle: &str, display_name: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry((bottle.to_string(), display_name.to_ascii_lowercase()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Record a shortcut, upholding the one-entry invariant.
    ///
    /// Returns the authoritative entry: the input for a clean write, or
    /// the preempting native entry when a manual write hit a conflict.
    pub async fn upsert(&self, entry: ShortcutEntry) -> Result<ShortcutEntry, CorkscrewError> {
        let lock = self.key_lock(&entry.bottle, &entry.display_name);
        let _guard = lock.lock().await;

        match entry.source {
            ShortcutSource::ManualRecord => self.upsert_manual(entry).await,
            ShortcutSource::EnvironmentNative => {
                // The native registry already holds the entry; drop any
                // manual record it supersedes.
                if self.store.remove(&entry.bottle, &entry.display_name)? {
                    tracing::debug!(
                        target: "shortcuts",
                        "dropped manual record for '{}' in '{}' superseded by native entry",
                        entry.display_name,
                        entry.bottle
                    );
                }
                Ok(entry)
            }
        }
    }

    async fn upsert_manual(&self, entry: ShortcutEntry) -> Result<ShortcutEntry, CorkscrewError> {
        if let Some(native) = self.native_entry(&entry.bottle, &entry.display_name).await {
            let conflict = CorkscrewError::ShortcutConflict {
                bottle: entry.bottle.clone(),
                display_name: entry.display_name.clone(),
                backend: ShortcutSource::EnvironmentNative.as_str().to_string(),
            };
            tracing::warn!(target: "shortcuts", "{conflict}; keeping the native entry");
            return Ok(ShortcutEntry {
                bottle: entry.bottle,
                display_name: native,
                target: entry.target,
                source: ShortcutSource::EnvironmentNative,
            });
        }

        self.store.upsert(SidecarRecord {
            bottle: entry.bottle.clone(),
            name: entry.display_name.clone(),
            target: entry.target.clone().unwrap_or_default(),
            created_at: Utc::now(),
        })?;
        tracing::info!(
            target: "shortcuts",
            "recorded manual shortcut '{}' in '{}'",
            entry.display_name,
            entry.bottle
        );
        Ok(entry)
    }

    /// Look up the entry for a (bottle, display name) pair. The native
    /// backend is authoritative when both hold an entry.
    pub async fn find(
        &self,
        bottle: &str,
        display_name: &str,
    ) -> Result<Option<ShortcutEntry>, CorkscrewError> {
        let manual = self.store.find(bottle, display_name)?;
        if let Some(native) = self.native_entry(bottle, display_name).await {
            return Ok(Some(ShortcutEntry {
                bottle: bottle.to_string(),
                display_name: native,
                target: manual.map(|record| record.target),
                source: ShortcutSource::EnvironmentNative,
            }));
        }
        Ok(manual.map(|record| ShortcutEntry {
            bottle: record.bottle,
            display_name: record.name,
            target: Some(record.target),
            source: ShortcutSource::ManualRecord,
        }))
    }

    /// List shortcuts. With a bottle, both backends are merged (native
    /// entries win their key); without one, only sidecar records are
    /// enumerated since the native backend is queried per bottle.
    pub async fn list(&self, bottle: Option<&str>) -> Result<Vec<ShortcutEntry>, CorkscrewError> {
        let records = self.store.load()?;
        let Some(bottle) = bottle else {
            return Ok(records
                .into_iter()
                .map(|record| ShortcutEntry {
                    bottle: record.bottle,
                    display_name: record.name,
                    target: Some(record.target),
                    source: ShortcutSource::ManualRecord,
                })
                .collect());
        };

        let manual: Vec<SidecarRecord> =
            records.into_iter().filter(|r| r.bottle == bottle).collect();
        let native = match self.gateway.list_native_shortcuts(bottle).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(target: "shortcuts", "native listing for '{bottle}' unavailable: {e}");
                Vec::new()
            }
        };

        let mut entries: Vec<ShortcutEntry> = native
            .iter()
            .map(|shortcut| ShortcutEntry {
                bottle: bottle.to_string(),
                display_name: shortcut.name.clone(),
                target: manual
                    .iter()
                    .find(|r| r.name.eq_ignore_ascii_case(&shortcut.name))
                    .map(|r| r.target.clone()),
                source: ShortcutSource::EnvironmentNative,
            })
            .collect();
        for record in manual {
            if !native.iter().any(|s| s.name.eq_ignore_ascii_case(&record.name)) {
                entries.push(ShortcutEntry {
                    bottle: record.bottle,
                    display_name: record.name,
                    target: Some(record.target),
                    source: ShortcutSource::ManualRecord,
                });
            }
        }
        Ok(entries)
    }

    async fn native_entry(&self, bottle: &str, display_name: &str) -> Option<String> {
        match self.gateway.list_native_shortcuts(bottle).await {
            Ok(list) => list
                .into_iter()
                .find(|s| s.name.eq_ignore_ascii_case(display_name))
                .map(|s| s.name),
            Err(e) => {
                tracing::warn!(
                    target: "shortcuts",
                    "native listing for '{bottle}' unavailable: {e}"
                );
                None
            }
        }
    }

    /// The sidecar file backing manual records.
    pub fn sidecar_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }
}
