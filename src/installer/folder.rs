//! Folder-based install state machine
//!
//! Handles pre-extracted application trees: the tree is copied into the
//! environment's managed storage, the launchable binary is discovered in
//! the copy, dependencies install, the binary runs once, and the shortcut
//! is recorded in the manual sidecar. The native shortcut mechanism is
//! never used here - the manager does not reliably associate a shortcut
//! with a binary that did not arrive through its own installer-run flow.
//!
//! States: `Created -> EnvironmentReady -> Copied -> ExecutableDiscovered
//! -> DependenciesResolved -> Executed -> ShortcutRecorded -> Done`. The
//! copy is all-or-nothing from the caller's perspective: a mid-copy
//! failure fails the install and leaves the partial copy in place (no
//! destructive cleanup of ambiguous state).

use std::path::PathBuf;

use crate::core::{InstallStage, StageResultExt, StagedFailure};
use crate::installer::{InstallContext, discovery};
use crate::models::{ShortcutEntry, ShortcutSource, sanitize_name};

enum State {
    Created,
    EnvironmentReady,
    Copied(PathBuf),
    ExecutableDiscovered(PathBuf),
    DependenciesResolved(PathBuf),
    Executed(PathBuf),
    ShortcutRecorded(ShortcutEntry),
}

/// State machine for one folder-based install.
pub struct FolderInstaller<'a> {
    ctx: InstallContext<'a>,
    source: PathBuf,
}

impl<'a> FolderInstaller<'a> {
    /// Build an installer for the application tree at `source`.
    pub const fn new(ctx: InstallContext<'a>, source: PathBuf) -> Self {
        Self { ctx, source }
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
                    let subdir = sanitize_name(&self.ctx.display_name);
                    let copied_root = self
                        .ctx
                        .gateway
                        .copy_tree(&self.ctx.bottle, &self.source, &subdir)
                        .await
                        .at_stage(InstallStage::Staging)?;
                    State::Copied(copied_root)
                }
                State::Copied(copied_root) => {
                    self.checkpoint(InstallStage::Discovery)?;
                    let display_name = self.ctx.display_name.clone();
                    let binary = tokio::task::spawn_blocking(move || {
                        discovery::discover_executable(&copied_root, &display_name)
                    })
                    .await
                    .map_err(|e| {
                        StagedFailure::new(
                            InstallStage::Discovery,
                            crate::core::CorkscrewError::Other(anyhow::anyhow!(
                                "discovery task panicked: {e}"
                            )),
                        )
                    })?
                    .at_stage(InstallStage::Discovery)?;
                    tracing::info!(
                        target: "installer",
                        "selected launch binary {}",
                        binary.display()
                    );
                    State::ExecutableDiscovered(binary)
                }
                State::ExecutableDiscovered(binary) => {
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
                    // Always a manual record for folder installs.
                    let entry = self
                        .ctx
                        .shortcuts
                        .upsert(ShortcutEntry {
                            bottle: self.ctx.bottle.clone(),
                            display_name: self.ctx.display_name.clone(),
                            target: Some(binary),
                            source: ShortcutSource::ManualRecord,
                        })
                        .await
                        .at_stage(InstallStage::Shortcut)?;
                    State::ShortcutRecorded(entry)
                }
                State::ShortcutRecorded(entry) => return Ok(entry),
            };
        }
    }

    fn checkpoint(&self, stage: InstallStage) -> Result<(), StagedFailure> {
        self.ctx.cancel.checkpoint(stage).at_stage(stage)
    }
}
