//! Test utilities for corkscrew
//!
//! Available in unit tests and, behind the `test-utils` feature, to the
//! integration suite. Provides:
//! - [`FakeGateway`] - a scripted, in-process [`EnvironmentGateway`] that
//!   records every call, so the installer state machines run end-to-end
//!   without a Bottles installation
//! - [`synthetic_pe`] / [`write_synthetic_pe`] - minimal PE32 images with
//!   a chosen import table, for exercising the static scanner on real
//!   bytes
//! - [`init_test_logging`] - opt-in tracing output for debugging tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::core::CorkscrewError;
use crate::gateway::{
    EnvironmentGateway, EnvironmentStatus, ImportProbe, NativeShortcut, RunOutcome, StagedImage,
};

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing for tests, once, honoring `RUST_LOG`.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const SECTION_RVA: u32 = 0x1000;
const SECTION_RAW_OFFSET: u32 = 0x200;
const IMPORT_DESCRIPTOR_SIZE: usize = 20;

/// Build a minimal PE32 image whose import table lists `imports` in
/// order. The result parses with the crate's own scanner and is a
/// convenient stand-in for a real Windows executable in tests.
pub fn synthetic_pe(imports: &[&str]) -> Vec<u8> {
    // Import section payload: descriptors (plus terminator), then names.
    let descriptors_len = (imports.len() + 1) * IMPORT_DESCRIPTOR_SIZE;
    let mut names = Vec::new();
    let mut name_rvas = Vec::new();
    for import in imports {
        name_rvas.push(SECTION_RVA + descriptors_len as u32 + names.len() as u32);
        names.extend_from_slice(import.as_bytes());
        names.push(0);
    }

    let mut section = Vec::new();
    for rva in &name_rvas {
        let mut descriptor = [0u8; IMPORT_DESCRIPTOR_SIZE];
        descriptor[12..16].copy_from_slice(&rva.to_le_bytes());
        section.extend_from_slice(&descriptor);
    }
    section.extend_from_slice(&[0u8; IMPORT_DESCRIPTOR_SIZE]);
    section.extend_from_slice(&names);
    let section_len = section.len() as u32;

    let mut image = vec![0u8; SECTION_RAW_OFFSET as usize];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    image[0x40..0x44].copy_from_slice(b"PE\0\0");

    let coff = 0x44;
    image[coff..coff + 2].copy_from_slice(&0x014cu16.to_le_bytes());
    image[coff + 2..coff + 4].copy_from_slice(&1u16.to_le_bytes());
    image[coff + 16..coff + 18].copy_from_slice(&0x00e0u16.to_le_bytes());
    image[coff + 18..coff + 20].copy_from_slice(&0x0102u16.to_le_bytes());

    let opt = coff + 20;
    image[opt..opt + 2].copy_from_slice(&0x010bu16.to_le_bytes());
    image[opt + 92..opt + 96].copy_from_slice(&16u32.to_le_bytes());
    // Data directory 1: the import table
    image[opt + 104..opt + 108].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[opt + 108..opt + 112].copy_from_slice(&section_len.to_le_bytes());

    let header = opt + 0xe0;
    image[header..header + 6].copy_from_slice(b".idata");
    image[header + 8..header + 12].copy_from_slice(&section_len.to_le_bytes());
    image[header + 12..header + 16].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[header + 16..header + 20].copy_from_slice(&section_len.to_le_bytes());
    image[header + 20..header + 24].copy_from_slice(&SECTION_RAW_OFFSET.to_le_bytes());

    image.extend_from_slice(&section);
    image
}

/// Write a synthetic PE to `path`, creating parent directories.
pub fn write_synthetic_pe(path: &Path, imports: &[&str]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, synthetic_pe(imports)).expect("write synthetic pe");
}

/// A scripted in-process gateway.
///
/// Copies and staging happen for real under `prefix_root` (a temp
/// directory), so discovery and the static scanner operate on actual
/// files; everything else is recorded in memory. Failure switches script
/// the error paths the state machines must survive.
pub struct FakeGateway {
    prefix_root: PathBuf,
    /// Every environment name ever ensured
    pub environments: Mutex<HashSet<String>>,
    /// How many ensure calls actually created an environment
    pub created_count: AtomicUsize,
    /// (bottle, component) pairs in install order
    pub installed_components: Mutex<Vec<(String, String)>>,
    /// (bottle, binary) pairs in execution order
    pub executed: Mutex<Vec<(String, PathBuf)>>,
    /// Bottles that were sanitized after creation
    pub sanitized: Mutex<Vec<String>>,
    native_shortcuts: Mutex<HashMap<String, Vec<NativeShortcut>>>,
    /// Simulate the manager auto-registering a shortcut after a run
    pub auto_shortcut_on_run: AtomicBool,
    /// Make `run_binary` fail as a timeout
    pub run_times_out: AtomicBool,
    /// Make installing this component fail
    pub fail_component: Mutex<Option<String>>,
    /// Scripted runtime probe response
    pub probe_response: Mutex<ImportProbe>,
}

impl FakeGateway {
    /// A gateway whose prefixes live under `prefix_root`.
    pub fn new(prefix_root: impl Into<PathBuf>) -> Self {
        Self {
            prefix_root: prefix_root.into(),
            environments: Mutex::new(HashSet::new()),
            created_count: AtomicUsize::new(0),
            installed_components: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            sanitized: Mutex::new(Vec::new()),
            native_shortcuts: Mutex::new(HashMap::new()),
            auto_shortcut_on_run: AtomicBool::new(false),
            run_times_out: AtomicBool::new(false),
            fail_component: Mutex::new(None),
            probe_response: Mutex::new(ImportProbe::default()),
        }
    }

    /// Script a native shortcut into the manager's registry.
    pub fn add_native_shortcut(&self, bottle: &str, name: &str) {
        self.native_shortcuts
            .lock()
            .unwrap()
            .entry(bottle.to_string())
            .or_default()
            .push(NativeShortcut {
                name: name.to_string(),
            });
    }

    /// Component ids installed into `bottle`, in order.
    pub fn components_for(&self, bottle: &str) -> Vec<String> {
        self.installed_components
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, _)| b == bottle)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Number of recorded executions.
    pub fn execution_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl EnvironmentGateway for FakeGateway {
    async fn ensure_environment(&self, name: &str) -> Result<EnvironmentStatus, CorkscrewError> {
        let mut environments = self.environments.lock().unwrap();
        if environments.insert(name.to_string()) {
            self.created_count.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(self.prefix_path(name).join("drive_c"))?;
            Ok(EnvironmentStatus::Created)
        } else {
            Ok(EnvironmentStatus::Existing)
        }
    }

    async fn sanitize_environment(&self, name: &str) -> Result<(), CorkscrewError> {
        self.sanitized.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn mount_image(&self, image: &Path) -> Result<StagedImage, CorkscrewError> {
        // Pretend the image contains a single installer with the same
        // bytes as the image file itself.
        let bytes = std::fs::read(image).map_err(|e| CorkscrewError::Staging {
            path: image.to_path_buf(),
            reason: e.to_string(),
        })?;
        let stem = image
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
        let root = self.prefix_root.join("staging").join(stem);
        std::fs::create_dir_all(&root)?;
        let setup_binary = root.join("setup.exe");
        std::fs::write(&setup_binary, bytes)?;
        Ok(StagedImage { root, setup_binary })
    }

    async fn copy_tree(
        &self,
        name: &str,
        src: &Path,
        subdir: &str,
    ) -> Result<PathBuf, CorkscrewError> {
        let dest = self.prefix_path(name).join("drive_c").join(subdir);
        crate::utils::fs::copy_tree(src, &dest).map_err(|e| CorkscrewError::Staging {
            path: src.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(dest)
    }

    async fn install_component(&self, name: &str, component: &str) -> Result<(), CorkscrewError> {
        if self.fail_component.lock().unwrap().as_deref() == Some(component) {
            return Err(CorkscrewError::DependencyInstall {
                name: name.to_string(),
                component: component.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.installed_components
            .lock()
            .unwrap()
            .push((name.to_string(), component.to_string()));
        Ok(())
    }

    async fn run_binary(
        &self,
        name: &str,
        binary: &Path,
        timeout: Duration,
    ) -> Result<RunOutcome, CorkscrewError> {
        if self.run_times_out.load(Ordering::SeqCst) {
            return Err(CorkscrewError::Execution {
                name: name.to_string(),
                binary: binary.to_path_buf(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            });
        }
        self.executed
            .lock()
            .unwrap()
            .push((name.to_string(), binary.to_path_buf()));
        if self.auto_shortcut_on_run.load(Ordering::SeqCst) {
            let stem = binary
                .file_stem()
                .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
            self.add_native_shortcut(name, &stem);
        }
        Ok(RunOutcome { exit_code: 0 })
    }

    async fn probe_imports(
        &self,
        _name: &str,
        _binary: &Path,
        _timeout: Duration,
    ) -> Result<ImportProbe, CorkscrewError> {
        Ok(self.probe_response.lock().unwrap().clone())
    }

    async fn list_native_shortcuts(
        &self,
        name: &str,
    ) -> Result<Vec<NativeShortcut>, CorkscrewError> {
        Ok(self
            .native_shortcuts
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_native_shortcut(
        &self,
        name: &str,
        display_name: &str,
        _target: &Path,
    ) -> Result<(), CorkscrewError> {
        self.add_native_shortcut(name, display_name);
        Ok(())
    }

    fn prefix_path(&self, name: &str) -> PathBuf {
        self.prefix_root.join(name)
    }
}
