//! Shortcut persistence invariants across both backends

use std::sync::Arc;
use std::sync::atomic::Ordering;

use corkscrew::models::{InstallRequest, ShortcutSource};
use corkscrew::service::OrchestrationService;
use corkscrew::test_utils::{FakeGateway, write_synthetic_pe};

use crate::harness;

#[tokio::test]
async fn native_entry_preempts_a_later_folder_install_shortcut() {
    let h = harness();

    // A file install that leaves a native shortcut named "launcher".
    let exe = h.dir.path().join("data/launcher.exe");
    write_synthetic_pe(&exe, &["kernel32.dll"]);
    h.gateway.auto_shortcut_on_run.store(true, Ordering::SeqCst);
    let outcome = h
        .service
        .install(InstallRequest::new(&exe).with_bottle("Mixed"))
        .await;
    assert!(outcome.is_success());
    h.gateway.auto_shortcut_on_run.store(false, Ordering::SeqCst);

    // A folder install into the same bottle under the same display name:
    // the manual write is skipped, the native entry stays authoritative.
    let tree = h.dir.path().join("data/LauncherTree");
    write_synthetic_pe(&tree.join("launcher.exe"), &["kernel32.dll"]);
    let outcome = h
        .service
        .install(
            InstallRequest::new(&tree)
                .with_bottle("Mixed")
                .with_display_name("launcher"),
        )
        .await;
    assert!(outcome.is_success());
    assert_eq!(
        outcome.shortcut().unwrap().source,
        ShortcutSource::EnvironmentNative
    );

    // Exactly one entry is retrievable for the key.
    let entries = h.service.shortcuts().list(Some("Mixed")).await.unwrap();
    let launcher_entries: Vec<_> = entries
        .iter()
        .filter(|e| e.display_name.eq_ignore_ascii_case("launcher"))
        .collect();
    assert_eq!(launcher_entries.len(), 1);
    assert_eq!(launcher_entries[0].source, ShortcutSource::EnvironmentNative);
}

#[tokio::test]
async fn repeated_folder_installs_keep_one_sidecar_entry() {
    let h = harness();
    let tree = h.dir.path().join("data/App");
    write_synthetic_pe(&tree.join("App.exe"), &["kernel32.dll"]);
    let request = InstallRequest::new(&tree).with_bottle("App");

    for _ in 0..3 {
        assert!(h.service.install(request.clone()).await.is_success());
    }

    let entries = h.service.shortcuts().list(Some("App")).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn sidecar_records_survive_a_new_service_instance() {
    let h = harness();
    let tree = h.dir.path().join("data/Persist");
    write_synthetic_pe(&tree.join("Persist.exe"), &["kernel32.dll"]);
    assert!(
        h.service
            .install(InstallRequest::new(&tree).with_bottle("Persist"))
            .await
            .is_success()
    );

    // A fresh service over the same data directory sees the record.
    let config = h.service.config().clone();
    let gateway = Arc::new(FakeGateway::new(config.prefix_base.clone()));
    let fresh = OrchestrationService::new(config, gateway);

    let found = fresh
        .shortcuts()
        .find("Persist", "Persist")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.source, ShortcutSource::ManualRecord);
}
