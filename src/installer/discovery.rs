//! Launchable binary discovery inside a copied application tree
//!
//! Scans a tree for `.exe` candidates and scores them against the
//! install's display name. The walk order is deterministic
//! (lexicographic), so equal scores always resolve the same way.
//!
//! Scoring weights: name similarity to the display/folder name dominates,
//! with smaller bonuses for living in a well-known binary directory, for
//! substantial file size, and for recent modification. Obvious
//! non-targets (uninstallers, crash reporters, redistributable payloads)
//! are excluded up front, as are system directories.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::core::CorkscrewError;

const EXCLUDED_DIRS: &[&str] = &["windows", "system32", "syswow64", "temp_installer", "installer"];

const EXCLUDED_KEYWORDS: &[&str] = &[
    "uninstall", "crash", "report", "update", "patch", "readme", "vcredist", "directx", "setup",
    "inst", "uninst",
];

const PREFERRED_DIR_HINTS: &[&str] = &["bin", "binaries", "win64", "win32", "program files"];

const DAY_SECS: u64 = 60 * 60 * 24;

/// A scored launch candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Candidate executable path
    pub path: PathBuf,
    /// Composite score; higher is better
    pub score: i64,
}

/// Pick the launchable binary for a copied tree.
///
/// Returns the highest-scoring candidate, falling back to deterministic
/// walk order on ties. Zero candidates is a discovery failure.
pub fn discover_executable(root: &Path, display_name: &str) -> Result<PathBuf, CorkscrewError> {
    score_candidates(root, display_name)
        .into_iter()
        .next()
        .map(|candidate| candidate.path)
        .ok_or_else(|| CorkscrewError::Discovery {
            root: root.to_path_buf(),
        })
}

/// Enumerate and score every plausible candidate, best first.
pub fn score_candidates(root: &Path, display_name: &str) -> Vec<Candidate> {
    let hint = normalize(display_name);
    let mut candidates = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && is_excluded_dir(entry.path())));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(stem) = entry.path().file_stem().map(|s| s.to_string_lossy().to_lowercase())
        else {
            continue;
        };
        let is_exe = entry
            .path()
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("exe"));
        if !is_exe || EXCLUDED_KEYWORDS.iter().any(|k| stem.contains(k)) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        let mut score = (strsim::normalized_levenshtein(&hint, &normalize(&stem)) * 40.0) as i64;

        let parent = entry
            .path()
            .parent()
            .map(|p| p.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if PREFERRED_DIR_HINTS.iter().any(|h| parent.contains(h)) {
            score += 10;
        }

        let size = metadata.len();
        if size > 2 * 1024 * 1024 {
            score += 6;
        }
        if size > 20 * 1024 * 1024 {
            score += 4;
        }

        if let Ok(modified) = metadata.modified() {
            let age_days = SystemTime::now()
                .duration_since(modified)
                .map_or(u64::MAX, |age| age.as_secs() / DAY_SECS);
            if age_days < 30 {
                score += 3;
            } else if age_days < 180 {
                score += 1;
            }
        }

        candidates.push(Candidate {
            path: entry.path().to_path_buf(),
            score,
        });
    }

    // Stable sort: ties keep deterministic walk order.
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

fn is_excluded_dir(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| EXCLUDED_DIRS.contains(&name.as_str()))
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"stub").unwrap();
    }

    #[test]
    fn name_similarity_wins() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("aaa.exe"));
        touch(&dir.path().join("CoolGame.exe"));
        touch(&dir.path().join("zzz.exe"));

        let best = discover_executable(dir.path(), "Cool Game").unwrap();
        assert!(best.ends_with("CoolGame.exe"));
    }

    #[test]
    fn ties_fall_back_to_walk_order() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("bbbb.exe"));
        touch(&dir.path().join("aaaa.exe"));

        // Equally dissimilar names; lexicographic walk order decides.
        let best = discover_executable(dir.path(), "zzzz").unwrap();
        assert!(best.ends_with("aaaa.exe"));
    }

    #[test]
    fn uninstallers_and_system_dirs_are_excluded() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("uninstall.exe"));
        touch(&dir.path().join("windows/system32/game.exe"));
        touch(&dir.path().join("app/game.exe"));

        let candidates = score_candidates(dir.path(), "game");
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].path.ends_with("app/game.exe"));
    }

    #[test]
    fn binary_directories_get_a_bonus() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("stuff/launcher.exe"));
        touch(&dir.path().join("bin/launcher.exe"));

        let candidates = score_candidates(dir.path(), "launcher");
        assert!(candidates[0].path.ends_with("bin/launcher.exe"));
        assert!(candidates[0].score > candidates[1].score);
    }

    #[test]
    fn empty_tree_is_a_discovery_error() {
        let dir = tempdir().unwrap();
        let err = discover_executable(dir.path(), "game").unwrap_err();
        assert!(matches!(err, CorkscrewError::Discovery { .. }));
    }
}
