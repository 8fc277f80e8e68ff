//! Shared data model for the installer workflow
//!
//! These types flow between the strategy router, the installer state
//! machines, the dependency resolver, the shortcut manager and the
//! orchestration service. Requests and reports are immutable once
//! produced: a re-scan or a resubmission creates a new value, never
//! mutates an old one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{InstallStage, StagedFailure};

/// What the caller (agent layer) believes the target is.
///
/// Advisory only: the strategy router always recomputes the classification
/// from live filesystem state and overrides a conflicting hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredKind {
    /// The caller believes the target is a single installer file
    File,
    /// The caller believes the target is a pre-extracted application tree
    Folder,
    /// The caller makes no claim
    #[default]
    Unknown,
}

/// Deterministic classification of an install target.
///
/// Derived from the filesystem, never persisted; recomputed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A runnable installer binary (`.exe`, `.msi`)
    Executable,
    /// A disc image that must be staged before its installer can run (`.iso`)
    DiskImage,
    /// A pre-extracted application tree
    Folder,
    /// Nothing an installer can act on
    Invalid,
}

/// Result of classifying an install target.
#[derive(Debug, Clone)]
pub struct TargetClassification {
    /// The derived target kind
    pub kind: TargetKind,
    /// Human-readable explanation, used in errors for `Invalid`
    pub reason: String,
}

/// A structured install request, created by the caller from parsed intent.
///
/// Immutable once submitted. The bottle and display names fall back to a
/// sanitized form of the target's file stem when the caller does not
/// provide them.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Absolute path of the installer file or application folder
    pub target_path: PathBuf,
    /// The caller's advisory file-vs-folder hint
    pub declared_kind: DeclaredKind,
    /// Target bottle name; derived from the target path when absent
    pub bottle: Option<String>,
    /// Display name for the resulting shortcut; derived when absent
    pub display_name: Option<String>,
}

impl InstallRequest {
    /// Build a request for `target_path` with no hints.
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            declared_kind: DeclaredKind::Unknown,
            bottle: None,
            display_name: None,
        }
    }

    /// Set the advisory kind hint.
    #[must_use]
    pub const fn with_declared_kind(mut self, kind: DeclaredKind) -> Self {
        self.declared_kind = kind;
        self
    }

    /// Set the target bottle name.
    #[must_use]
    pub fn with_bottle(mut self, bottle: impl Into<String>) -> Self {
        self.bottle = Some(bottle.into());
        self
    }

    /// Set the shortcut display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The bottle this request installs into.
    pub fn bottle_name(&self) -> String {
        self.bottle
            .clone()
            .unwrap_or_else(|| sanitize_name(&path_stem(&self.target_path)))
    }

    /// The display name for the resulting shortcut.
    pub fn shortcut_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| path_stem(&self.target_path))
    }
}

fn path_stem(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map_or_else(|| "install".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Restrict a derived name to characters the environment manager accepts.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() { "bottle".to_string() } else { cleaned }
}

/// Whether a runtime component ships with the base compatibility runtime
/// or must be installed into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Provided by the runner itself; reported but never installed
    BaseRuntime,
    /// Must be installed through the environment manager
    MustInstall,
}

/// An installable compatibility-library package from the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeComponent {
    /// Canonical component identifier (a winetricks verb or manager component)
    pub id: &'static str,
    /// Whether an install is required
    pub provided_by: Provenance,
}

/// Outcome of scanning one binary for runtime dependencies.
///
/// Produced once per scan and never mutated; a re-scan produces a new
/// report.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    /// The binary that was scanned
    pub binary_path: PathBuf,
    /// Library names referenced by the binary, in scan order
    pub detected_imports: Vec<String>,
    /// Resolved components, normalized to the fixed install order
    pub resolved_components: Vec<RuntimeComponent>,
    /// Imports with no catalog mapping; reported, never fatal
    pub unresolved_imports: Vec<String>,
}

impl DependencyReport {
    /// Components that actually require an install, in install order.
    pub fn must_install(&self) -> impl Iterator<Item = &RuntimeComponent> {
        self.resolved_components
            .iter()
            .filter(|c| c.provided_by == Provenance::MustInstall)
    }
}

/// Which backend holds a shortcut entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortcutSource {
    /// The environment manager's own shortcut registry
    EnvironmentNative,
    /// The structured sidecar record maintained by corkscrew
    ManualRecord,
}

impl ShortcutSource {
    /// Stable name used in logs and conflict messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnvironmentNative => "environment-native",
            Self::ManualRecord => "manual-record",
        }
    }
}

/// A persisted reference letting a user relaunch an installed application.
///
/// Exactly one entry exists per (bottle, display name) pair; `source`
/// determines the authoritative backend. The native backend exposes
/// display names only, so `target` may be absent for adopted entries
/// whose program path the manager does not report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutEntry {
    /// The bottle the target lives in
    pub bottle: String,
    /// User-visible shortcut name
    pub display_name: String,
    /// Absolute path of the launched executable, when known
    pub target: Option<PathBuf>,
    /// The backend holding this entry
    pub source: ShortcutSource,
}

/// Terminal result of one install request. Never mutated after return.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The workflow reached its final state.
    Succeeded {
        /// The recorded shortcut, when bookkeeping produced one
        shortcut: Option<ShortcutEntry>,
    },
    /// The workflow stopped at `stage`. External state is left as-is.
    Failed {
        /// The stage at which the failure occurred
        stage: InstallStage,
        /// The underlying error
        error: crate::core::CorkscrewError,
    },
}

impl InstallOutcome {
    /// Whether the install completed.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The shortcut recorded for a successful install.
    pub const fn shortcut(&self) -> Option<&ShortcutEntry> {
        match self {
            Self::Succeeded { shortcut } => shortcut.as_ref(),
            Self::Failed { .. } => None,
        }
    }

    /// The failing stage, for failed outcomes.
    pub const fn failed_stage(&self) -> Option<InstallStage> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { stage, .. } => Some(*stage),
        }
    }
}

impl From<StagedFailure> for InstallOutcome {
    fn from(failure: StagedFailure) -> Self {
        Self::Failed {
            stage: failure.stage,
            error: failure.source,
        }
    }
}
