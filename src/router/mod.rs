//! Strategy routing for install requests
//!
//! Classifies a request's target path into the install strategy that will
//! handle it. Classification is recomputed from live filesystem state on
//! every request: the caller's `declared_kind` comes from a
//! natural-language guess and is advisory only - when it conflicts with
//! what the filesystem says, the filesystem wins. A misclassified hint
//! must never drive an unsafe code path.

use std::path::Path;

use crate::core::CorkscrewError;
use crate::models::{DeclaredKind, InstallRequest, TargetClassification, TargetKind};

/// Extensions handled by the file installer.
const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "msi"];
const DISK_IMAGE_EXTENSIONS: &[&str] = &["iso"];

/// Classify an install request against the live filesystem.
///
/// Rules, in order: a missing path is `Invalid`; a directory is `Folder`;
/// a file with an installer extension is `Executable` or `DiskImage`;
/// anything else is `Invalid`.
pub fn classify(request: &InstallRequest) -> TargetClassification {
    let path = &request.target_path;

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => {
            return TargetClassification {
                kind: TargetKind::Invalid,
                reason: "path not found".to_string(),
            };
        }
    };

    let classification = if metadata.is_dir() {
        TargetClassification {
            kind: TargetKind::Folder,
            reason: "target is a directory".to_string(),
        }
    } else {
        classify_file(path)
    };

    if hint_conflicts(request.declared_kind, classification.kind) {
        tracing::debug!(
            target: "router",
            "overriding '{:?}' hint for {}: filesystem says {:?}",
            request.declared_kind,
            path.display(),
            classification.kind
        );
    }

    classification
}

fn classify_file(path: &Path) -> TargetClassification {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if EXECUTABLE_EXTENSIONS.contains(&extension.as_str()) {
        TargetClassification {
            kind: TargetKind::Executable,
            reason: format!("installer extension '.{extension}'"),
        }
    } else if DISK_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        TargetClassification {
            kind: TargetKind::DiskImage,
            reason: format!("disc image extension '.{extension}'"),
        }
    } else {
        TargetClassification {
            kind: TargetKind::Invalid,
            reason: "unrecognized file type".to_string(),
        }
    }
}

const fn hint_conflicts(declared: DeclaredKind, observed: TargetKind) -> bool {
    match declared {
        DeclaredKind::Unknown => false,
        DeclaredKind::File => matches!(observed, TargetKind::Folder),
        DeclaredKind::Folder => matches!(observed, TargetKind::Executable | TargetKind::DiskImage),
    }
}

/// Build the classification error for an `Invalid` target.
pub fn rejection(request: &InstallRequest, classification: &TargetClassification) -> CorkscrewError {
    CorkscrewError::Classification {
        path: request.target_path.clone(),
        reason: classification.reason.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_path_is_invalid() {
        let request = InstallRequest::new("/definitely/not/here/setup.exe");
        let classification = classify(&request);
        assert!(matches!(classification.kind, TargetKind::Invalid));
        assert_eq!(classification.reason, "path not found");
    }

    #[test]
    fn directory_beats_file_hint() {
        let dir = tempdir().unwrap();
        let request =
            InstallRequest::new(dir.path()).with_declared_kind(DeclaredKind::File);
        assert!(matches!(classify(&request).kind, TargetKind::Folder));
    }

    #[test]
    fn file_beats_folder_hint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("setup.exe");
        std::fs::write(&path, b"stub").unwrap();
        let request = InstallRequest::new(&path).with_declared_kind(DeclaredKind::Folder);
        assert!(matches!(classify(&request).kind, TargetKind::Executable));
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        let dir = tempdir().unwrap();
        for (name, expected) in [
            ("Setup.EXE", TargetKind::Executable),
            ("installer.MSI", TargetKind::Executable),
            ("game.Iso", TargetKind::DiskImage),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"stub").unwrap();
            let request = InstallRequest::new(&path);
            assert!(
                std::mem::discriminant(&classify(&request).kind)
                    == std::mem::discriminant(&expected),
                "{name} misclassified"
            );
        }
    }

    #[test]
    fn unknown_extension_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"stub").unwrap();
        let request = InstallRequest::new(&path);
        let classification = classify(&request);
        assert!(matches!(classification.kind, TargetKind::Invalid));
        assert_eq!(classification.reason, "unrecognized file type");
    }
}
