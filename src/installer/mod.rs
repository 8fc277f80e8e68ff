//! The two installer state machines
//!
//! A file-based install ([`file::FileInstaller`]) handles single-file
//! installers - a runnable executable or a disc image that stages one -
//! and adopts the environment manager's own shortcut mechanism. A
//! folder-based install ([`folder::FolderInstaller`]) copies a
//! pre-extracted application tree into the environment, discovers its
//! launchable binary, and records its shortcut in the manual sidecar.
//!
//! Both machines advance through explicit states; any state can move to a
//! failure carrying the stage name and the underlying cause. There is no
//! rollback: a failure leaves the environment and any partially staged or
//! installed state exactly as the last successful step produced it, and
//! resubmitting the same request is safe because environment creation and
//! component installs are idempotent.
//!
//! Cancellation is cooperative: the shared [`CancelFlag`] is consulted at
//! every state transition, never mid-call.

pub mod discovery;
pub mod file;
pub mod folder;

pub use file::{FileInstaller, FileKind};
pub use folder::FolderInstaller;

use std::path::Path;

use crate::config::Config;
use crate::core::{CancelFlag, CorkscrewError};
use crate::gateway::{EnvironmentGateway, EnvironmentStatus};
use crate::models::DependencyReport;
use crate::resolver::DependencyResolver;
use crate::shortcuts::ShortcutManager;

/// Everything an installer run needs, borrowed from the orchestration
/// service for the duration of one request.
pub struct InstallContext<'a> {
    /// Immutable runtime configuration
    pub config: &'a Config,
    /// The environment gateway
    pub gateway: &'a dyn EnvironmentGateway,
    /// The dependency resolver
    pub resolver: &'a DependencyResolver,
    /// The shortcut manager
    pub shortcuts: &'a ShortcutManager,
    /// Cooperative cancellation flag for this request
    pub cancel: &'a CancelFlag,
    /// Target bottle name
    pub bottle: String,
    /// Display name for the resulting shortcut
    pub display_name: String,
}

impl InstallContext<'_> {
    /// Ensure the target environment exists and is usable.
    ///
    /// A freshly created environment gets best-effort sanitation and the
    /// configured baseline components; seeding failures degrade the
    /// environment but never fail the install.
    pub(crate) async fn prepare_environment(&self) -> Result<(), CorkscrewError> {
        let status = self.gateway.ensure_environment(&self.bottle).await?;
        if status == EnvironmentStatus::Created {
            self.gateway.sanitize_environment(&self.bottle).await?;
            for component in &self.config.baseline_components {
                if let Err(e) = self.gateway.install_component(&self.bottle, component).await {
                    tracing::warn!(
                        target: "installer",
                        "baseline component '{component}' failed in '{}': {e}",
                        self.bottle
                    );
                }
            }
        }
        Ok(())
    }

    /// Scan `binary` for dependencies, preferring the static import table
    /// and falling back to the runtime probe when it yields nothing.
    pub(crate) async fn resolve_dependencies(&self, binary: &Path) -> DependencyReport {
        match self.resolver.resolve(binary).await {
            Ok(report) if !report.detected_imports.is_empty() => report,
            Ok(empty_report) => self.probe_fallback(binary, empty_report).await,
            Err(e) => {
                tracing::debug!(
                    target: "installer",
                    "static scan of {} failed ({e}); trying runtime probe",
                    binary.display()
                );
                let empty = self.resolver.resolve_imports(binary, Vec::new());
                self.probe_fallback(binary, empty).await
            }
        }
    }

    async fn probe_fallback(
        &self,
        binary: &Path,
        fallback: DependencyReport,
    ) -> DependencyReport {
        match self
            .gateway
            .probe_imports(&self.bottle, binary, self.config.timeouts.probe())
            .await
        {
            Ok(probe) if !probe.is_empty() => {
                let imports: Vec<String> = probe.all().cloned().collect();
                self.resolver.resolve_imports(binary, imports)
            }
            Ok(_) => fallback,
            Err(e) => {
                tracing::warn!(
                    target: "installer",
                    "runtime probe of {} failed: {e}",
                    binary.display()
                );
                fallback
            }
        }
    }

    /// Install every `MustInstall` component from the report,
    /// sequentially in the fixed order, stopping at the first failure.
    pub(crate) async fn install_components(
        &self,
        report: &DependencyReport,
    ) -> Result<(), CorkscrewError> {
        if !report.unresolved_imports.is_empty() {
            tracing::debug!(
                target: "installer",
                "unresolved imports (ignored): {}",
                report.unresolved_imports.join(", ")
            );
        }
        for component in report.must_install() {
            self.gateway.install_component(&self.bottle, component.id).await?;
        }
        Ok(())
    }

    /// Run `binary` inside the environment with the configured bound.
    pub(crate) async fn execute_binary(&self, binary: &Path) -> Result<(), CorkscrewError> {
        self.gateway
            .run_binary(&self.bottle, binary, self.config.timeouts.run())
            .await
            .map(|_| ())
    }
}
