//! Production gateway driving the Bottles CLI toolchain
//!
//! Maps every [`EnvironmentGateway`] operation onto the detected external
//! commands. Wine prefixes live under the configured `prefix_base`; disc
//! images are extracted with `7z` into corkscrew's staging directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use walkdir::WalkDir;

use crate::config::Config;
use crate::core::CorkscrewError;
use crate::gateway::command_builder::{ManagerCommand, truncate};
use crate::gateway::detect::{self, ManagerCommands};
use crate::gateway::{
    EnvironmentGateway, EnvironmentStatus, ImportProbe, NativeShortcut, RunOutcome, StagedImage,
};
use crate::models::sanitize_name;
use crate::resolver::catalog;

/// Well-known installer binary names inside a disc image, in preference
/// order.
const SETUP_CANDIDATES: &[&str] = &["setup.exe", "install.exe", "autorun.exe", "start.exe"];

/// How deep inside an image to look for an installer binary.
const SETUP_SEARCH_DEPTH: usize = 2;

static LOADED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)load(?:ed)?\s+library\s+['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
        r#"(?i)Loaded module\s+['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static MISSING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)err:module:.*?\s+['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
        r#"(?i)Could not load\s+['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
        r#"(?i)failed to (?:open|load).*?['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
        r#"(?i)cannot open.*?['"]?([A-Za-z0-9_\-\.]+\.dll)['"]?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Gateway implementation over a detected Bottles installation.
pub struct BottlesGateway {
    commands: ManagerCommands,
    config: Arc<Config>,
}

impl BottlesGateway {
    /// Detect the manager installation and build a gateway over it.
    pub fn detect(config: Arc<Config>) -> Result<Self, CorkscrewError> {
        Ok(Self {
            commands: detect::detect()?,
            config,
        })
    }

    /// Build a gateway over an explicit command set.
    pub const fn with_commands(config: Arc<Config>, commands: ManagerCommands) -> Self {
        Self { commands, config }
    }

    fn wineprefix(&self, name: &str) -> String {
        self.prefix_path(name).display().to_string()
    }
}

#[async_trait]
impl EnvironmentGateway for BottlesGateway {
    async fn ensure_environment(&self, name: &str) -> Result<EnvironmentStatus, CorkscrewError> {
        let listing = ManagerCommand::new(&self.commands.bottles_cli, "list")
            .args(["list", "bottles"])
            .with_timeout(Some(self.config.timeouts.shortcut()))
            .execute()
            .await
            .map_err(|e| environment_error(name, &e))?;

        if listing.success() && listing_contains(&listing.stdout, name) {
            tracing::debug!(target: "gateway", "environment '{name}' already exists");
            return Ok(EnvironmentStatus::Existing);
        }

        tracing::info!(target: "gateway", "creating environment '{name}'");
        ManagerCommand::new(&self.commands.bottles_cli, "new")
            .args(["new", "--bottle-name", name, "--environment", "gaming"])
            .with_timeout(Some(self.config.timeouts.create()))
            .with_context(name)
            .execute_success()
            .await
            .map_err(|e| environment_error(name, &e))?;
        Ok(EnvironmentStatus::Created)
    }

    async fn sanitize_environment(&self, name: &str) -> Result<(), CorkscrewError> {
        let result = ManagerCommand::new(&self.commands.wine, "wineboot")
            .args(["wineboot", "--repair"])
            .env("WINEPREFIX", self.wineprefix(name))
            .with_timeout(Some(Duration::from_secs(60)))
            .with_context(name)
            .execute()
            .await;
        if let Err(e) = result {
            tracing::warn!(target: "gateway", "sanitize of '{name}' failed: {e}");
        }
        Ok(())
    }

    async fn mount_image(&self, image: &Path) -> Result<StagedImage, CorkscrewError> {
        which::which("7z").map_err(|_| CorkscrewError::Staging {
            path: image.to_path_buf(),
            reason: "7z is required but not found".to_string(),
        })?;

        let stem = image
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
        let root = self.config.staging_dir().join(sanitize_name(&stem));
        if root.exists() {
            std::fs::remove_dir_all(&root).map_err(|e| staging_error(image, &e.to_string()))?;
        }
        std::fs::create_dir_all(&root).map_err(|e| staging_error(image, &e.to_string()))?;

        tracing::info!(
            target: "gateway",
            "extracting {} -> {}",
            image.display(),
            root.display()
        );
        ManagerCommand::new(&["7z".to_string()], "extract")
            .arg("x")
            .arg(image.display().to_string())
            .arg(format!("-o{}", root.display()))
            .with_timeout(Some(self.config.timeouts.mount()))
            .execute_success()
            .await
            .map_err(|e| staging_error(image, &e.to_string()))?;

        let mut entries =
            std::fs::read_dir(&root).map_err(|e| staging_error(image, &e.to_string()))?;
        if entries.next().is_none() {
            return Err(staging_error(image, "empty extraction"));
        }

        let setup_binary = find_setup_binary(&root)
            .ok_or_else(|| staging_error(image, "no installer binary inside image"))?;
        Ok(StagedImage { root, setup_binary })
    }

    async fn copy_tree(
        &self,
        name: &str,
        src: &Path,
        subdir: &str,
    ) -> Result<PathBuf, CorkscrewError> {
        let dest = self.prefix_path(name).join("drive_c").join(subdir);
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| staging_error(src, &e.to_string()))?;
        }

        let blocking_src = src.to_path_buf();
        let blocking_dest = dest.clone();
        let copied = tokio::task::spawn_blocking(move || {
            crate::utils::fs::copy_tree(&blocking_src, &blocking_dest)
        })
        .await
        .map_err(|e| staging_error(src, &format!("copy task panicked: {e}")))?
        .map_err(|e| staging_error(src, &e.to_string()))?;

        tracing::info!(
            target: "gateway",
            "copied {copied} files: {} -> {}",
            src.display(),
            dest.display()
        );
        Ok(dest)
    }

    async fn install_component(&self, name: &str, component: &str) -> Result<(), CorkscrewError> {
        let result = if catalog::installs_via_manager(component) {
            ManagerCommand::new(&self.commands.bottles_cli, "add")
                .args(["add", "-b", name, "-n", component, "-p", "dummy"])
                .env("WINEPREFIX", self.wineprefix(name))
                .with_timeout(Some(self.config.timeouts.component()))
                .with_context(component)
                .execute()
                .await
        } else {
            ManagerCommand::new(&self.commands.winetricks, "winetricks")
                .arg(component)
                .env("WINEPREFIX", self.wineprefix(name))
                .with_timeout(Some(self.config.timeouts.component()))
                .with_context(component)
                .execute()
                .await
        };

        let output = result.map_err(|e| CorkscrewError::DependencyInstall {
            name: name.to_string(),
            component: component.to_string(),
            reason: e.to_string(),
        })?;

        // A component the environment already has counts as installed.
        if output.success() || output.stdout.contains("already installed") {
            tracing::debug!(target: "gateway", "component '{component}' ready in '{name}'");
            Ok(())
        } else {
            Err(CorkscrewError::DependencyInstall {
                name: name.to_string(),
                component: component.to_string(),
                reason: truncate(&output.stderr, 300).to_string(),
            })
        }
    }

    async fn run_binary(
        &self,
        name: &str,
        binary: &Path,
        timeout: Duration,
    ) -> Result<RunOutcome, CorkscrewError> {
        tracing::info!(
            target: "gateway",
            "running {} in '{name}'",
            binary.display()
        );
        let result = ManagerCommand::new(&self.commands.bottles_cli, "run")
            .args(["run", "--bottle", name])
            .arg(binary.display().to_string())
            .with_timeout(Some(timeout))
            .with_context(name)
            .execute()
            .await;

        match result {
            Ok(output) if output.success() => Ok(RunOutcome { exit_code: 0 }),
            Ok(output) => Err(CorkscrewError::Execution {
                name: name.to_string(),
                binary: binary.to_path_buf(),
                reason: format!(
                    "exit code {:?}: {}",
                    output.exit_code,
                    truncate(&output.stderr, 300)
                ),
            }),
            Err(CorkscrewError::CommandTimeout { seconds, .. }) => Err(CorkscrewError::Execution {
                name: name.to_string(),
                binary: binary.to_path_buf(),
                reason: format!("timed out after {seconds}s"),
            }),
            Err(e) => Err(CorkscrewError::Execution {
                name: name.to_string(),
                binary: binary.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    async fn probe_imports(
        &self,
        name: &str,
        binary: &Path,
        timeout: Duration,
    ) -> Result<ImportProbe, CorkscrewError> {
        tracing::debug!(
            target: "gateway",
            "probing {} under DLL-load tracing",
            binary.display()
        );
        // Software rendering fallbacks keep the probe alive in
        // GPU-restricted sandboxes.
        let output = ManagerCommand::new(&self.commands.wine, "probe")
            .arg(binary.display().to_string())
            .env("WINEPREFIX", self.wineprefix(name))
            .env("WINEDEBUG", "+loaddll")
            .env("LIBGL_ALWAYS_SOFTWARE", "1")
            .env("GALLIUM_DRIVER", "llvmpipe")
            .env("MESA_GL_VERSION_OVERRIDE", "3.3")
            .with_timeout(Some(timeout))
            .kill_on_timeout()
            .with_context(name)
            .execute()
            .await?;

        Ok(parse_probe_log(&output.stderr))
    }

    async fn list_native_shortcuts(
        &self,
        name: &str,
    ) -> Result<Vec<NativeShortcut>, CorkscrewError> {
        let output = ManagerCommand::new(&self.commands.bottles_cli, "programs")
            .args(["programs", "-b", name])
            .with_timeout(Some(self.config.timeouts.shortcut()))
            .execute_success()
            .await?;
        Ok(parse_programs_output(&output.stdout))
    }

    async fn create_native_shortcut(
        &self,
        name: &str,
        display_name: &str,
        target: &Path,
    ) -> Result<(), CorkscrewError> {
        let prefix = self.prefix_path(name);
        let relative = shortcut_path_inside(&prefix, target).ok_or_else(|| {
            CorkscrewError::CommandFailed {
                program: "bottles-cli".to_string(),
                operation: "add".to_string(),
                stderr: format!("'{}' is not inside the environment", target.display()),
            }
        })?;

        ManagerCommand::new(&self.commands.bottles_cli, "add")
            .args(["add", "-b", name, "-n", display_name, "-p", relative.as_str()])
            .env("WINEPREFIX", prefix.display().to_string())
            .current_dir(prefix.join("drive_c"))
            .with_timeout(Some(self.config.timeouts.shortcut()))
            .with_context(name)
            .execute_success()
            .await?;
        tracing::debug!(target: "gateway", "registered shortcut '{display_name}' in '{name}'");
        Ok(())
    }

    fn prefix_path(&self, name: &str) -> PathBuf {
        self.config.prefix_base.join(name)
    }
}

fn environment_error(name: &str, cause: &dyn std::fmt::Display) -> CorkscrewError {
    CorkscrewError::Environment {
        name: name.to_string(),
        reason: cause.to_string(),
    }
}

fn staging_error(path: &Path, reason: &str) -> CorkscrewError {
    CorkscrewError::Staging {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Whether a `list bottles` output mentions `name` as an entry.
fn listing_contains(stdout: &str, name: &str) -> bool {
    stdout
        .lines()
        .map(|line| line.trim().trim_start_matches('-').trim())
        .any(|entry| entry == name)
}

/// Parse `bottles-cli programs` output into shortcut names.
fn parse_programs_output(stdout: &str) -> Vec<NativeShortcut> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(|line| NativeShortcut {
            name: line.trim_start_matches('-').trim().to_string(),
        })
        .filter(|shortcut| !shortcut.name.is_empty())
        .collect()
}

/// Parse the DLL-load trace of a probed run.
fn parse_probe_log(stderr: &str) -> ImportProbe {
    let mut loaded = std::collections::BTreeSet::new();
    let mut missing = std::collections::BTreeSet::new();
    for pattern in LOADED_PATTERNS.iter() {
        for capture in pattern.captures_iter(stderr) {
            loaded.insert(capture[1].to_string());
        }
    }
    for pattern in MISSING_PATTERNS.iter() {
        for capture in pattern.captures_iter(stderr) {
            missing.insert(capture[1].to_string());
        }
    }
    ImportProbe {
        loaded: loaded.into_iter().collect(),
        missing: missing.into_iter().collect(),
    }
}

/// Locate the primary installer binary inside an extracted image.
fn find_setup_binary(root: &Path) -> Option<PathBuf> {
    for candidate in SETUP_CANDIDATES {
        for entry in WalkDir::new(root)
            .max_depth(SETUP_SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().eq_ignore_ascii_case(candidate)
            {
                return Some(entry.path().to_path_buf());
            }
        }
    }
    None
}

/// The shortcut path the manager expects: relative to the prefix, without
/// the `drive_c/` prefix.
fn shortcut_path_inside(prefix: &Path, target: &Path) -> Option<String> {
    let relative = target.strip_prefix(prefix).ok()?;
    let relative = relative.strip_prefix("drive_c").unwrap_or(relative);
    Some(relative.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_match_is_exact_per_entry() {
        let stdout = "Bottles:\n- Gaming\n- MyGame\n";
        assert!(listing_contains(stdout, "MyGame"));
        assert!(!listing_contains(stdout, "My"));
    }

    #[test]
    fn programs_output_parses_names() {
        let stdout = "Programs in bottle:\n- Cool Game\n- Launcher\n\n";
        let shortcuts = parse_programs_output(stdout);
        let names: Vec<_> = shortcuts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Cool Game", "Launcher"]);
    }

    #[test]
    fn probe_log_separates_loaded_from_missing() {
        let stderr = "\
trace: loaded library 'xinput1_3.dll'\n\
err:module:import_dll Library msvcp140.dll not found\n\
trace: Loaded module \"dinput8.dll\"\n";
        let probe = parse_probe_log(stderr);
        assert!(probe.loaded.contains(&"xinput1_3.dll".to_string()));
        assert!(probe.loaded.contains(&"dinput8.dll".to_string()));
        assert!(probe.missing.contains(&"msvcp140.dll".to_string()));
    }

    #[test]
    fn setup_binary_found_at_shallow_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("disc")).unwrap();
        std::fs::write(dir.path().join("disc/SETUP.EXE"), b"stub").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"stub").unwrap();

        let found = find_setup_binary(dir.path()).unwrap();
        assert!(found.ends_with("disc/SETUP.EXE"));
    }

    #[test]
    fn setup_candidates_are_preferred_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("autorun.exe"), b"stub").unwrap();
        std::fs::write(dir.path().join("setup.exe"), b"stub").unwrap();

        let found = find_setup_binary(dir.path()).unwrap();
        assert!(found.ends_with("setup.exe"));
    }

    #[test]
    fn shortcut_path_strips_prefix_and_drive() {
        let prefix = Path::new("/data/bottles/Game");
        let target = Path::new("/data/bottles/Game/drive_c/App/game.exe");
        assert_eq!(
            shortcut_path_inside(prefix, target).unwrap(),
            "App/game.exe"
        );
        assert!(shortcut_path_inside(prefix, Path::new("/elsewhere/game.exe")).is_none());
    }
}
