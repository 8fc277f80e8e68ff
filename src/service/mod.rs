//! Orchestration service
//!
//! The entry point consumed by the agent/API layer. One operation -
//! [`OrchestrationService::install`] - sequences router, installer,
//! dependency resolver, gateway and shortcut manager, and owns per-target
//! concurrency control: an exclusive per-environment lease is held from
//! before routing until the workflow reaches a terminal state, so
//! concurrent installs into distinct bottles proceed in parallel while a
//! second request for a busy bottle queues behind the holder.
//!
//! The install call is infallible at the type level: every failure is
//! folded into [`InstallOutcome::Failed`] with its originating stage, and
//! the caller may safely resubmit the same request.

pub mod lease;

pub use lease::EnvironmentLease;

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::core::{CancelFlag, CorkscrewError, InstallStage};
use crate::gateway::EnvironmentGateway;
use crate::installer::{FileInstaller, FileKind, FolderInstaller, InstallContext};
use crate::models::{DependencyReport, InstallOutcome, InstallRequest, TargetKind};
use crate::resolver::DependencyResolver;
use crate::router;
use crate::shortcuts::ShortcutManager;

/// The installer orchestration core.
pub struct OrchestrationService {
    config: Arc<Config>,
    gateway: Arc<dyn EnvironmentGateway>,
    resolver: DependencyResolver,
    shortcuts: Arc<ShortcutManager>,
}

impl OrchestrationService {
    /// Build a service over a gateway. The configuration is immutable
    /// from here on.
    pub fn new(config: Config, gateway: Arc<dyn EnvironmentGateway>) -> Self {
        let config = Arc::new(config);
        let shortcuts = Arc::new(ShortcutManager::new(&config, gateway.clone()));
        Self {
            config,
            gateway,
            resolver: DependencyResolver::new(),
            shortcuts,
        }
    }

    /// The service configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shortcut manager, for lookups outside an install.
    pub fn shortcuts(&self) -> &ShortcutManager {
        &self.shortcuts
    }

    /// Run one install request to its terminal outcome.
    pub async fn install(&self, request: InstallRequest) -> InstallOutcome {
        self.install_cancellable(request, CancelFlag::new()).await
    }

    /// Like [`install`](Self::install), with a cooperative cancellation
    /// flag checked between workflow states.
    pub async fn install_cancellable(
        &self,
        request: InstallRequest,
        cancel: CancelFlag,
    ) -> InstallOutcome {
        let bottle = request.bottle_name();
        tracing::info!(
            target: "service",
            "install request: {} -> bottle '{bottle}'",
            request.target_path.display()
        );

        // Lease first: classification is cheap, but the invariant is one
        // workflow per environment name from routing to terminal state.
        let lease = match EnvironmentLease::acquire(&self.config.locks_dir(), &bottle).await {
            Ok(lease) => lease,
            Err(error) => {
                return InstallOutcome::Failed {
                    stage: InstallStage::Environment,
                    error,
                };
            }
        };

        let outcome = self.run_workflow(&request, &bottle, &cancel).await;
        drop(lease);

        match &outcome {
            InstallOutcome::Succeeded { shortcut } => {
                tracing::info!(
                    target: "service",
                    "install into '{bottle}' succeeded{}",
                    shortcut
                        .as_ref()
                        .map(|s| format!(" (shortcut '{}')", s.display_name))
                        .unwrap_or_default()
                );
            }
            InstallOutcome::Failed { stage, error } => {
                tracing::warn!(
                    target: "service",
                    "install into '{bottle}' failed at {stage}: {error}"
                );
            }
        }
        outcome
    }

    async fn run_workflow(
        &self,
        request: &InstallRequest,
        bottle: &str,
        cancel: &CancelFlag,
    ) -> InstallOutcome {
        let classification = router::classify(request);
        let ctx = InstallContext {
            config: &self.config,
            gateway: self.gateway.as_ref(),
            resolver: &self.resolver,
            shortcuts: &self.shortcuts,
            cancel,
            bottle: bottle.to_string(),
            display_name: request.shortcut_name(),
        };

        let result = match classification.kind {
            TargetKind::Invalid => {
                return InstallOutcome::Failed {
                    stage: InstallStage::Classification,
                    error: router::rejection(request, &classification),
                };
            }
            TargetKind::Executable => {
                FileInstaller::new(ctx, request.target_path.clone(), FileKind::Executable)
                    .run()
                    .await
            }
            TargetKind::DiskImage => {
                FileInstaller::new(ctx, request.target_path.clone(), FileKind::DiskImage)
                    .run()
                    .await
            }
            TargetKind::Folder => {
                FolderInstaller::new(ctx, request.target_path.clone()).run().await
            }
        };

        match result {
            Ok(entry) => InstallOutcome::Succeeded {
                shortcut: Some(entry),
            },
            Err(failure) => failure.into(),
        }
    }

    /// Dry-run dependency analysis: scan a binary without installing
    /// anything. With a bottle, the runtime probe supplements a static
    /// scan that found nothing.
    pub async fn analyze(
        &self,
        binary: &Path,
        bottle: Option<&str>,
    ) -> Result<DependencyReport, CorkscrewError> {
        let static_report = self.resolver.resolve(binary).await;
        match (static_report, bottle) {
            (Ok(report), _) if !report.detected_imports.is_empty() => Ok(report),
            (Ok(report), None) => Ok(report),
            (Err(e), None) => Err(e),
            (static_result, Some(bottle)) => {
                if let Err(e) = &static_result {
                    tracing::debug!(
                        target: "service",
                        "static scan failed ({e}); probing in '{bottle}'"
                    );
                }
                let probe = self
                    .gateway
                    .probe_imports(bottle, binary, self.config.timeouts.probe())
                    .await?;
                Ok(self
                    .resolver
                    .resolve_imports(binary, probe.all().cloned().collect()))
            }
        }
    }
}
