//! CLI smoke tests
//!
//! Only the paths that need no environment manager: help/version output
//! and the purely static `analyze` command.

use assert_cmd::Command;
use predicates::prelude::*;

use corkscrew::test_utils::write_synthetic_pe;

fn corkscrew() -> Command {
    Command::cargo_bin("corkscrew").unwrap()
}

#[test]
fn help_lists_the_commands() {
    corkscrew()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("shortcuts"));
}

#[test]
fn version_flag_works() {
    corkscrew()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("corkscrew"));
}

#[test]
fn analyze_reports_components_and_unresolved_imports() {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("setup.exe");
    write_synthetic_pe(&binary, &["d3dcompiler_47.dll", "foo.dll"]);

    corkscrew()
        .arg("analyze")
        .arg(&binary)
        .assert()
        .success()
        .stdout(predicate::str::contains("d3dcompiler_47"))
        .stdout(predicate::str::contains("foo.dll"));
}

#[test]
fn analyze_json_output_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("setup.exe");
    write_synthetic_pe(&binary, &["msvcp140.dll"]);

    let output = corkscrew()
        .arg("analyze")
        .arg(&binary)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["resolved_components"][0]["id"], "vcrun2019");
}

#[test]
fn analyze_of_a_non_pe_file_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("readme.txt");
    std::fs::write(&path, "not a binary").unwrap();

    corkscrew()
        .arg("analyze")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("import table"));
}
