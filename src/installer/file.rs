//! File-based install state machine
//!
//! Handles single-file installers: a runnable executable, or a disc image
//! whose primary installer binary is staged by the gateway first.
//!
//! States: `Created -> EnvironmentReady -> Staged -> DependenciesResolved
//! -> Executed -> ShortcutCreated -> Done`; any state can move to a
//! failure carrying its stage. The shortcut step is pure bookkeeping: the
//! manager usually registers a shortcut on its own after a successful
//! installer run, so the machine polls for one within a bounded window
//! and synthesizes an entry if none appears. Shortcut problems never fail
//! an install that already executed.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

use crate::core::{InstallStage, StageResultExt, StagedFailure};
use crate::installer::InstallContext;
use crate::models::{ShortcutEntry, ShortcutSource};

/// How often the polling window re-checks the native registry.
const SHORTCUT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Which flavor of single-file target is being installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The target itself is the installer binary
    Executable,
    /// The target is a disc image; staging resolves the installer binary
    DiskImage,
}

enum State {
    Created,
    EnvironmentReady,
    Staged(PathBuf),
    DependenciesResolved(PathBuf),
    Executed(PathBuf),
    ShortcutCreated(ShortcutEntry),
}

/// State machine for one file-based install.
pub struct FileInstaller<'a> {
    ctx: InstallContext<'a>,
    target: PathBuf,
    kind: FileKind,
}

impl<'a> FileInstaller<'a> {
    /// Build an installer for `target`.
    pub const fn new(ctx: InstallContext<'a>, target: PathBuf, kind: FileKind) -> Self {
        Self { ctx, target, kind }
    }

    /// Drive the machine to `Done` or the first failure.
    pub async fn run(self) -> Result<ShortcutEntry, StagedFailure> {
        let mut state = State::Created;
        loop {
            state = match state {
                State::Created => {
                    self.checkpoint(InstallStage::Environment)?;
                    self.ctx
                        .prepare_environment()
                        .await
                        .at_stage(InstallStage::Environment)?;
                    State::EnvironmentReady
                }
                State::EnvironmentReady => {
                    self.checkpoint(InstallStage::Staging)?;
                    let binary = match self.kind {
                        FileKind::Executable => self.target.clone(),
                        FileKind::DiskImage => {
                            self.ctx
                                .gateway
                                .mount_image(&self.target)
                                .await
                                .at_stage(InstallStage::Staging)?
                                .setup_binary
                        }
                    };
                    State::Staged(binary)
                }
                State::Staged(binary) => {
                    self.checkpoint(InstallStage::Dependencies)?;
                    let report = self.ctx.resolve_dependencies(&binary).await;
                    self.ctx
                        .install_components(&report)
                        .await
                        .at_stage(InstallStage::Dependencies)?;
                    State::DependenciesResolved(binary)
                }
                State::DependenciesResolved(binary) => {
                    self.checkpoint(InstallStage::Execution)?;
                    self.ctx
                        .execute_binary(&binary)
                        .await
                        .at_stage(InstallStage::Execution)?;
                    State::Executed(binary)
                }
                State::Executed(binary) => {
                    self.checkpoint(InstallStage::Shortcut)?;
                    State::ShortcutCreated(self.record_shortcut(&binary).await)
                }
                State::ShortcutCreated(entry) => return Ok(entry),
            };
        }
    }

    fn checkpoint(&self, stage: InstallStage) -> Result<(), StagedFailure> {
        self.ctx.cancel.checkpoint(stage).at_stage(stage)
    }

    /// Adopt the manager's auto-created shortcut if one appears within
    /// the polling window, otherwise synthesize one from the known binary
    /// path. Best-effort throughout.
    async fn record_shortcut(&self, binary: &Path) -> ShortcutEntry {
        let entry = self.adopt_or_synthesize(binary).await;
        match self.ctx.shortcuts.upsert(entry.clone()).await {
            Ok(reconciled) => reconciled,
            Err(e) => {
                tracing::warn!(
                    target: "installer",
                    "shortcut bookkeeping for '{}' failed: {e}",
                    entry.display_name
                );
                entry
            }
        }
    }

    async fn adopt_or_synthesize(&self, binary: &Path) -> ShortcutEntry {
        let deadline = Instant::now() + self.ctx.config.timeouts.shortcut_poll();
        let stem = binary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        loop {
            match self.ctx.gateway.list_native_shortcuts(&self.ctx.bottle).await {
                Ok(shortcuts) => {
                    if let Some(hit) = shortcuts.iter().find(|s| {
                        s.name.eq_ignore_ascii_case(&self.ctx.display_name)
                            || s.name.eq_ignore_ascii_case(&stem)
                    }) {
                        tracing::debug!(
                            target: "installer",
                            "adopting manager-created shortcut '{}'",
                            hit.name
                        );
                        return ShortcutEntry {
                            bottle: self.ctx.bottle.clone(),
                            display_name: hit.name.clone(),
                            target: Some(binary.to_path_buf()),
                            source: ShortcutSource::EnvironmentNative,
                        };
                    }
                }
                Err(e) => {
                    tracing::debug!(target: "installer", "shortcut listing failed: {e}");
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(SHORTCUT_POLL_INTERVAL.min(deadline - Instant::now())).await;
        }

        // None appeared; register one ourselves and carry on regardless.
        if let Err(e) = self
            .ctx
            .gateway
            .create_native_shortcut(&self.ctx.bottle, &self.ctx.display_name, binary)
            .await
        {
            tracing::debug!(
                target: "installer",
                "synthesized shortcut registration failed: {e}"
            );
        }
        ShortcutEntry {
            bottle: self.ctx.bottle.clone(),
            display_name: self.ctx.display_name.clone(),
            target: Some(binary.to_path_buf()),
            source: ShortcutSource::EnvironmentNative,
        }
    }
}
