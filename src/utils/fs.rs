//! File system helpers
//!
//! Small synchronous helpers shared by the shortcut sidecar, the gateway
//! staging paths and the folder installer. Callers on the async path wrap
//! the copy helpers in `spawn_blocking`.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::core::CorkscrewError;

/// Create a directory and all parents if missing.
pub fn ensure_dir(path: &Path) -> Result<(), CorkscrewError> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Write `content` to `path` atomically via write-then-rename.
///
/// The sidecar file must stay parseable even if the process dies
/// mid-write, so content goes to a sibling temp file which is synced and
/// then renamed over the destination. Parent directories are created as
/// needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CorkscrewError> {
    use std::io::Write;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| CorkscrewError::Io(e.error))?;
    Ok(())
}

/// String convenience wrapper around [`atomic_write`].
pub fn atomic_write_string(path: &Path, content: &str) -> Result<(), CorkscrewError> {
    atomic_write(path, content.as_bytes())
}

/// Recursively copy `src` into `dest`, returning the number of files
/// copied.
///
/// The walk order is deterministic (lexicographic by file name). There is
/// no cleanup on error: a failure mid-copy leaves whatever was already
/// copied in place, matching the installer's no-rollback policy.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64, CorkscrewError> {
    ensure_dir(dest)?;
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CorkscrewError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("walk failed under {}", src.display()))
            }))
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_creates_parents_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.toml");
        atomic_write_string(&path, "key = 1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "key = 1\n");
        // No temp file left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.toml");
        atomic_write_string(&path, "old").unwrap();
        atomic_write_string(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn copy_tree_preserves_structure() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub/deeper")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("sub/b.txt"), "b").unwrap();
        fs::write(src.join("sub/deeper/c.txt"), "c").unwrap();

        let dest = dir.path().join("dest");
        let copied = copy_tree(&src, &dest).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(fs::read_to_string(dest.join("sub/deeper/c.txt")).unwrap(), "c");
    }

    #[test]
    fn copy_tree_of_missing_source_fails() {
        let dir = tempdir().unwrap();
        let result = copy_tree(&dir.path().join("absent"), &dir.path().join("dest"));
        assert!(result.is_err());
    }
}
