//! Per-environment write leases
//!
//! An environment (bottle) is a shared mutable resource, so at most one
//! install workflow may mutate a given name at any time. The lease is an
//! exclusive file lock under the data directory's `.locks/`, which also
//! serializes installs across processes. Acquisition blocks - a second
//! request for a busy name queues behind the holder instead of being
//! rejected, since sequential reuse of one bottle is an expected
//! workflow. The lock releases when the lease drops, on success and
//! failure alike.
//!
//! The blocking lock call runs inside `spawn_blocking` so it never stalls
//! the async runtime.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::core::CorkscrewError;
use crate::models::sanitize_name;

/// An exclusive lease on one environment name.
#[derive(Debug)]
pub struct EnvironmentLease {
    _file: File,
    path: PathBuf,
    name: String,
}

impl EnvironmentLease {
    /// Acquire the lease for `name`, blocking until the current holder
    /// (if any) releases it.
    pub async fn acquire(locks_dir: &Path, name: &str) -> Result<Self, CorkscrewError> {
        tokio::fs::create_dir_all(locks_dir).await.map_err(|e| {
            CorkscrewError::Environment {
                name: name.to_string(),
                reason: format!("cannot create locks directory {}: {e}", locks_dir.display()),
            }
        })?;

        let lock_path = locks_dir.join(format!("{}.lock", sanitize_name(name)));
        let blocking_path = lock_path.clone();
        let blocking_name = name.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File, CorkscrewError> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&blocking_path)
                .map_err(|e| CorkscrewError::Environment {
                    name: blocking_name.clone(),
                    reason: format!("cannot open lease file {}: {e}", blocking_path.display()),
                })?;
            file.lock_exclusive().map_err(|e| CorkscrewError::Environment {
                name: blocking_name,
                reason: format!("cannot acquire lease: {e}"),
            })?;
            Ok(file)
        })
        .await
        .map_err(|e| CorkscrewError::Environment {
            name: name.to_string(),
            reason: format!("lease task panicked: {e}"),
        })??;

        tracing::debug!(target: "service", "acquired lease for '{name}'");
        Ok(Self {
            _file: file,
            path: lock_path,
            name: name.to_string(),
        })
    }

    /// The environment name this lease covers.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for EnvironmentLease {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self._file.unlock() {
            tracing::warn!(
                target: "service",
                "failed to unlock {}: {e}",
                self.path.display()
            );
        }
        tracing::debug!(target: "service", "released lease for '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lease_can_be_reacquired_after_release() {
        let dir = TempDir::new().unwrap();
        let first = EnvironmentLease::acquire(dir.path(), "bottle").await.unwrap();
        assert_eq!(first.name(), "bottle");
        drop(first);
        let second = EnvironmentLease::acquire(dir.path(), "bottle").await.unwrap();
        drop(second);
    }

    #[tokio::test]
    async fn distinct_names_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let a = EnvironmentLease::acquire(dir.path(), "bottle-a").await.unwrap();
        let b = EnvironmentLease::acquire(dir.path(), "bottle-b").await.unwrap();
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn second_acquire_queues_behind_holder() {
        let dir = TempDir::new().unwrap();
        let held = EnvironmentLease::acquire(dir.path(), "bottle").await.unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let acquired_clone = acquired.clone();
        let locks_dir = dir.path().to_path_buf();
        let waiter = tokio::spawn(async move {
            let lease = EnvironmentLease::acquire(&locks_dir, "bottle").await.unwrap();
            acquired_clone.store(true, Ordering::SeqCst);
            drop(lease);
        });

        // The waiter must still be blocked while the lease is held.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!acquired.load(Ordering::SeqCst));

        drop(held);
        waiter.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
