//! Error handling for corkscrew
//!
//! The error system is built around two principles:
//! 1. **Strongly-typed errors** for precise handling inside the installer
//!    state machines
//! 2. **User-friendly messages** with actionable suggestions at the CLI
//!    boundary
//!
//! # Architecture
//!
//! - [`CorkscrewError`] - enumerated error types for every failure mode
//! - [`InstallStage`] - the workflow stage at which a failure occurred
//! - [`StagedFailure`] - an error annotated with its originating stage,
//!   produced by the installer state machines
//! - [`ErrorContext`] - wrapper that adds a user-facing message and
//!   suggestion for terminal display
//!
//! # Propagation policy
//!
//! Every error except [`CorkscrewError::ShortcutConflict`] short-circuits
//! the active installer and surfaces as a failed install outcome carrying
//! the originating stage. Shortcut conflicts are logged and resolved in
//! favor of the environment-native backend; they never fail an install.
//! Errors are never retried automatically - the caller may resubmit the
//! same request, which is safe because environment creation and component
//! installs are idempotent.

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for corkscrew operations.
///
/// Each variant represents a specific failure mode with enough context to
/// tell the user what failed and where. External process failures carry
/// the program and its stderr rather than leaking raw output into
/// unstructured strings.
#[derive(Error, Debug)]
pub enum CorkscrewError {
    /// The target path could not be classified into an install strategy.
    ///
    /// Raised by the strategy router when the path does not exist or has
    /// no recognized installer extension.
    #[error("cannot classify '{path}': {reason}")]
    Classification {
        /// The path that failed classification
        path: PathBuf,
        /// Why it could not be classified (e.g. "path not found")
        reason: String,
    },

    /// Creating or looking up the named environment failed.
    #[error("environment '{name}' could not be prepared: {reason}")]
    Environment {
        /// The bottle name
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Staging the install media failed (image extraction or tree copy).
    #[error("staging '{path}' failed: {reason}")]
    Staging {
        /// The source being staged
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// No launchable binary was found in a copied application tree.
    #[error("no launchable executable found under '{root}'")]
    Discovery {
        /// Root of the scanned tree
        root: PathBuf,
    },

    /// A required runtime component failed to install.
    #[error("component '{component}' failed to install into '{name}': {reason}")]
    DependencyInstall {
        /// The bottle name
        name: String,
        /// The component identifier from the catalog
        component: String,
        /// Underlying cause
        reason: String,
    },

    /// Running the target binary failed or exceeded its timeout.
    #[error("execution of '{binary}' in '{name}' failed: {reason}")]
    Execution {
        /// The bottle name
        name: String,
        /// The binary that was run
        binary: PathBuf,
        /// Underlying cause, including timeout information
        reason: String,
    },

    /// A shortcut for this (bottle, display name) pair already exists in
    /// another backend.
    ///
    /// Non-fatal: the existing entry stays authoritative and the write is
    /// skipped. Logged, never propagated as an install failure.
    #[error("shortcut '{display_name}' in '{bottle}' already exists in the {backend} backend")]
    ShortcutConflict {
        /// The bottle name
        bottle: String,
        /// The conflicting display name
        display_name: String,
        /// The backend holding the authoritative entry
        backend: String,
    },

    /// An external manager command exited non-zero.
    #[error("{program} {operation} failed")]
    CommandFailed {
        /// The external program (e.g. "bottles-cli", "winetricks")
        program: String,
        /// The operation being performed (e.g. "new", "run")
        operation: String,
        /// Captured stderr from the command
        stderr: String,
    },

    /// An external manager command exceeded its bounded timeout.
    #[error("{program} {operation} timed out after {seconds}s")]
    CommandTimeout {
        /// The external program
        program: String,
        /// The operation being performed
        operation: String,
        /// The timeout that was exceeded
        seconds: u64,
    },

    /// No environment manager installation was found on this host.
    #[error("no Bottles installation (Flatpak or native) found")]
    ManagerNotFound,

    /// The binary could not be parsed as a PE executable.
    #[error("cannot read import table of '{path}': {reason}")]
    ImportParse {
        /// The binary that failed to parse
        path: PathBuf,
        /// What was malformed
        reason: String,
    },

    /// The install was cancelled at a cooperative checkpoint.
    #[error("install cancelled before the {stage} stage")]
    Cancelled {
        /// The stage that was about to start
        stage: InstallStage,
    },

    /// File system operation failed.
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed (config file or shortcut sidecar).
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Generic error wrapper for other error types.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The stage of an install workflow at which a failure occurred.
///
/// Reported in failed install outcomes so the caller can retry with
/// corrected input instead of reacting to a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStage {
    /// Routing the request to an installer
    Classification,
    /// Creating or reusing the named environment
    Environment,
    /// Mounting an image or copying an application tree
    Staging,
    /// Locating a launchable binary in a copied tree
    Discovery,
    /// Resolving and installing runtime components
    Dependencies,
    /// Running the target binary inside the environment
    Execution,
    /// Recording the shortcut for the installed target
    Shortcut,
}

impl InstallStage {
    /// Stable lowercase name used in logs and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Environment => "environment",
            Self::Staging => "staging",
            Self::Discovery => "discovery",
            Self::Dependencies => "dependencies",
            Self::Execution => "execution",
            Self::Shortcut => "shortcut",
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error annotated with the install stage that produced it.
///
/// This is the failure type of both installer state machines. The
/// orchestration service folds it into a failed install outcome.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StagedFailure {
    /// The stage at which the workflow stopped
    pub stage: InstallStage,
    /// The underlying error
    #[source]
    pub source: CorkscrewError,
}

impl StagedFailure {
    /// Annotate an error with its originating stage.
    pub const fn new(stage: InstallStage, source: CorkscrewError) -> Self {
        Self { stage, source }
    }
}

/// Extension trait for attaching a stage to a fallible operation.
pub trait StageResultExt<T> {
    /// Map the error side into a [`StagedFailure`] at the given stage.
    fn at_stage(self, stage: InstallStage) -> Result<T, StagedFailure>;
}

impl<T> StageResultExt<T> for Result<T, CorkscrewError> {
    fn at_stage(self, stage: InstallStage) -> Result<T, StagedFailure> {
        self.map_err(|e| StagedFailure::new(stage, e))
    }
}

/// User-facing error wrapper with an optional suggestion and details.
///
/// Produced at the CLI boundary by [`user_friendly_error`]; the typed
/// error stays available for programmatic handling while the context
/// renders a colored, actionable message for the terminal.
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// A short actionable suggestion, when one is known
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no suggestion.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
        }
    }

    /// Attach an actionable suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Print the error (and suggestion, if any) to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".yellow(), cause);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("\n{} {}", "suggestion:".green().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nsuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion keyed off
/// the typed error, when one applies.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = error.downcast_ref::<CorkscrewError>().and_then(suggestion_for);
    let ctx = ErrorContext::new(error);
    match suggestion {
        Some(s) => ctx.with_suggestion(s),
        None => ctx,
    }
}

fn suggestion_for(error: &CorkscrewError) -> Option<String> {
    match error {
        CorkscrewError::Classification { .. } => Some(
            "Check that the path exists and points at an installer (.exe, .msi), \
             a disc image (.iso), or an application folder"
                .to_string(),
        ),
        CorkscrewError::ManagerNotFound => Some(
            "Install Bottles from flathub (com.usebottles.bottles) or make sure \
             bottles-cli, wine and winetricks are on PATH"
                .to_string(),
        ),
        CorkscrewError::CommandTimeout { program, .. } => Some(format!(
            "The {program} invocation may be waiting for input or the operation is \
             unusually slow; re-run with --verbose to see the command"
        )),
        CorkscrewError::Execution { .. } => Some(
            "The environment is left as-is; re-running the same install is safe".to_string(),
        ),
        _ => None,
    }
}
