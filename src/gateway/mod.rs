//! Environment gateway
//!
//! The single typed boundary between the installer core and the external
//! environment manager. All process invocation, timeout management and
//! error translation lives behind the [`EnvironmentGateway`] trait;
//! installer state machines depend only on the trait, which is what makes
//! them testable against a substitutable fake.
//!
//! The production implementation is [`BottlesGateway`], which drives
//! `bottles-cli`, `wine`, `winetricks` and `7z` through the
//! [`ManagerCommand`] builder. Every external failure - non-zero exit,
//! timeout, unparseable output - is mapped to a typed
//! [`CorkscrewError`]; raw process output never reaches callers.

pub mod bottles;
pub mod command_builder;
pub mod detect;

pub use bottles::BottlesGateway;
pub use command_builder::{CommandOutput, ManagerCommand};
pub use detect::{ManagerCommands, ManagerFlavor};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::CorkscrewError;

/// Whether `ensure_environment` found or created the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentStatus {
    /// The named environment already existed; reuse is expected
    Existing,
    /// A new environment was created
    Created,
}

/// A staged disc image: the extraction root and the primary installer
/// binary found inside it.
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Extraction directory (left in place after the install)
    pub root: PathBuf,
    /// The installer binary to execute
    pub setup_binary: PathBuf,
}

/// Result of a successful target execution.
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    /// Exit code of the target (zero on this path)
    pub exit_code: i32,
}

/// Libraries observed while running the target under DLL-load tracing.
#[derive(Debug, Clone, Default)]
pub struct ImportProbe {
    /// Libraries the runtime loaded successfully
    pub loaded: Vec<String>,
    /// Libraries the runtime failed to load
    pub missing: Vec<String>,
}

impl ImportProbe {
    /// Every observed library name, loaded and missing.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.loaded.iter().chain(self.missing.iter())
    }

    /// Whether the probe observed anything at all.
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.missing.is_empty()
    }
}

/// A shortcut entry in the manager's own registry.
///
/// The manager exposes display names only; target paths are not part of
/// its listing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeShortcut {
    /// The program name as registered with the manager
    pub name: String,
}

/// Typed operations on the external environment manager.
///
/// Environment names are opaque identifiers; binary paths are absolute.
/// Every method is a blocking external invocation with a bounded timeout.
#[async_trait]
pub trait EnvironmentGateway: Send + Sync {
    /// Look up the named environment, creating it if absent. Idempotent:
    /// reusing an existing name is expected for repeat installs.
    async fn ensure_environment(&self, name: &str) -> Result<EnvironmentStatus, CorkscrewError>;

    /// Repair a freshly created environment. Best-effort: failures are
    /// logged, never propagated.
    async fn sanitize_environment(&self, name: &str) -> Result<(), CorkscrewError>;

    /// Extract a disc image into staging space and locate its primary
    /// installer binary.
    async fn mount_image(&self, image: &Path) -> Result<StagedImage, CorkscrewError>;

    /// Recursively copy `src` into the environment's managed storage
    /// under `subdir`, returning the copied root.
    async fn copy_tree(
        &self,
        name: &str,
        src: &Path,
        subdir: &str,
    ) -> Result<PathBuf, CorkscrewError>;

    /// Install a runtime component from the fixed catalog. Idempotent:
    /// an already-installed component succeeds.
    async fn install_component(&self, name: &str, component: &str) -> Result<(), CorkscrewError>;

    /// Run a binary inside the environment, bounded by `timeout`.
    async fn run_binary(
        &self,
        name: &str,
        binary: &Path,
        timeout: Duration,
    ) -> Result<RunOutcome, CorkscrewError>;

    /// Run a binary under DLL-load tracing for up to `timeout`, then stop
    /// it and report the libraries it tried to load.
    async fn probe_imports(
        &self,
        name: &str,
        binary: &Path,
        timeout: Duration,
    ) -> Result<ImportProbe, CorkscrewError>;

    /// List the manager's own shortcut registry for the environment.
    async fn list_native_shortcuts(
        &self,
        name: &str,
    ) -> Result<Vec<NativeShortcut>, CorkscrewError>;

    /// Register a shortcut in the manager's own registry.
    async fn create_native_shortcut(
        &self,
        name: &str,
        display_name: &str,
        target: &Path,
    ) -> Result<(), CorkscrewError>;

    /// The on-disk prefix of the named environment.
    fn prefix_path(&self, name: &str) -> PathBuf;
}
