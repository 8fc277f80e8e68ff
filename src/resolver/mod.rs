//! Dependency resolution
//!
//! Maps a Windows binary's imported library names onto the runtime
//! components that must exist in the target environment before the binary
//! can run. Resolution is a pure function over the fixed catalog: the
//! same binary always yields the same [`DependencyReport`], with
//! components normalized to the declared install order.
//!
//! Coverage is best-effort by design. An import with no catalog entry is
//! recorded in `unresolved_imports` and never blocks an install - a
//! missing mapping degrades the install, it does not fail it.
//!
//! # Example
//!
//! ```rust,no_run
//! use corkscrew::resolver::DependencyResolver;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), corkscrew::core::CorkscrewError> {
//! let resolver = DependencyResolver::new();
//! let report = resolver.resolve(Path::new("/data/Game/setup.exe")).await?;
//! for component in report.must_install() {
//!     println!("needs {}", component.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod pe;

use std::collections::HashSet;
use std::path::Path;

use crate::core::CorkscrewError;
use crate::models::{DependencyReport, RuntimeComponent};

/// Stateless resolver over the compiled-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a resolver.
    pub const fn new() -> Self {
        Self
    }

    /// Scan the binary at `path` and resolve its imports.
    pub async fn resolve(&self, path: &Path) -> Result<DependencyReport, CorkscrewError> {
        let binary_path = path.to_path_buf();
        let scan_path = binary_path.clone();
        let imports = tokio::task::spawn_blocking(move || pe::extract_imports(&scan_path))
            .await
            .map_err(|e| CorkscrewError::Other(anyhow::anyhow!("scan task panicked: {e}")))??;
        Ok(self.resolve_imports(binary_path, imports))
    }

    /// Resolve an already-extracted import list. Pure and deterministic.
    pub fn resolve_imports(
        &self,
        binary_path: impl Into<std::path::PathBuf>,
        imports: Vec<String>,
    ) -> DependencyReport {
        let mut seen_components = HashSet::new();
        let mut seen_unresolved = HashSet::new();
        let mut specs = Vec::new();
        let mut unresolved = Vec::new();

        for import in &imports {
            match catalog::lookup(import) {
                Some(spec) => {
                    if seen_components.insert(spec.id) {
                        specs.push(spec);
                    }
                }
                None => {
                    if seen_unresolved.insert(import.to_ascii_lowercase()) {
                        unresolved.push(import.clone());
                    }
                }
            }
        }

        // First-seen dedup above, then the declared fixed order.
        specs.sort_by(|a, b| catalog::install_order(a, b));

        DependencyReport {
            binary_path: binary_path.into(),
            detected_imports: imports,
            resolved_components: specs
                .into_iter()
                .map(|spec| RuntimeComponent {
                    id: spec.id,
                    provided_by: spec.provided_by,
                })
                .collect(),
            unresolved_imports: unresolved,
        }
    }
}
