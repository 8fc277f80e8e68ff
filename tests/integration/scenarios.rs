//! End-to-end install scenarios

use std::sync::atomic::Ordering;

use corkscrew::core::{CancelFlag, CorkscrewError, InstallStage};
use corkscrew::gateway::{EnvironmentGateway, ImportProbe};
use corkscrew::models::{DeclaredKind, InstallRequest, ShortcutSource};
use corkscrew::resolver::DependencyResolver;
use corkscrew::test_utils::write_synthetic_pe;

use crate::harness;
use crate::harness_with;

#[tokio::test]
async fn file_install_completes_with_native_shortcut() {
    let h = harness();
    let target = h.dir.path().join("data/Game/setup.exe");
    write_synthetic_pe(&target, &["msvcp140.dll", "kernel32.dll"]);
    h.gateway.auto_shortcut_on_run.store(true, Ordering::SeqCst);

    let request = InstallRequest::new(&target)
        .with_declared_kind(DeclaredKind::Unknown)
        .with_bottle("Game");
    let outcome = h.service.install(request).await;

    assert!(outcome.is_success(), "outcome: {outcome:?}");
    let shortcut = outcome.shortcut().unwrap();
    assert_eq!(shortcut.source, ShortcutSource::EnvironmentNative);
    assert_eq!(shortcut.bottle, "Game");

    // Only the mapped import installs; builtins are skipped.
    assert_eq!(h.gateway.components_for("Game"), vec!["vcrun2019"]);
    assert_eq!(h.gateway.execution_count(), 1);
}

#[tokio::test]
async fn folder_hint_is_overridden_and_manual_shortcut_recorded() {
    let h = harness();
    let tree = h.dir.path().join("data/GameFolder");
    write_synthetic_pe(&tree.join("GameFolder.exe"), &["kernel32.dll"]);

    // The caller wrongly claims this is a file; the filesystem wins.
    let request = InstallRequest::new(&tree)
        .with_declared_kind(DeclaredKind::File)
        .with_bottle("GameFolder");
    let outcome = h.service.install(request).await;

    assert!(outcome.is_success(), "outcome: {outcome:?}");
    assert_eq!(
        outcome.shortcut().unwrap().source,
        ShortcutSource::ManualRecord
    );

    // The tree was copied into the environment's storage.
    assert!(
        h.gateway
            .prefix_path("GameFolder")
            .join("drive_c/GameFolder/GameFolder.exe")
            .exists()
    );

    // The sidecar holds the record.
    let found = h
        .service
        .shortcuts()
        .find("GameFolder", "GameFolder")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.source, ShortcutSource::ManualRecord);
    assert!(found.target.unwrap().ends_with("GameFolder.exe"));
}

#[tokio::test]
async fn unresolved_imports_degrade_gracefully() {
    let h = harness();
    let target = h.dir.path().join("data/app/setup.exe");
    write_synthetic_pe(&target, &["d3dcompiler_47.dll", "foo.dll"]);

    let report = DependencyResolver::new().resolve(&target).await.unwrap();
    assert_eq!(report.unresolved_imports, vec!["foo.dll"]);

    let outcome = h
        .service
        .install(InstallRequest::new(&target).with_bottle("App"))
        .await;

    // The unmapped import never blocks the install.
    assert!(outcome.is_success(), "outcome: {outcome:?}");
    assert_eq!(h.gateway.components_for("App"), vec!["d3dcompiler_47"]);
    assert_eq!(h.gateway.execution_count(), 1);
}

#[tokio::test]
async fn execution_timeout_fails_at_stage_then_retry_succeeds() {
    let h = harness();
    let target = h.dir.path().join("data/setup.exe");
    write_synthetic_pe(&target, &["kernel32.dll"]);
    let request = InstallRequest::new(&target).with_bottle("Retry");

    h.gateway.run_times_out.store(true, Ordering::SeqCst);
    let outcome = h.service.install(request.clone()).await;
    assert_eq!(outcome.failed_stage(), Some(InstallStage::Execution));

    // The lease was released on failure; the same request is safe to
    // resubmit and the existing environment is reused.
    h.gateway.run_times_out.store(false, Ordering::SeqCst);
    let retry = h.service.install(request).await;
    assert!(retry.is_success(), "outcome: {retry:?}");
    assert_eq!(h.gateway.created_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disk_image_install_stages_the_setup_binary() {
    let h = harness();
    let image = h.dir.path().join("data/game.iso");
    write_synthetic_pe(&image, &["dxgi.dll"]);

    let outcome = h
        .service
        .install(InstallRequest::new(&image).with_bottle("Disc"))
        .await;

    assert!(outcome.is_success(), "outcome: {outcome:?}");
    let executed = h.gateway.executed.lock().unwrap().clone();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].1.ends_with("setup.exe"));
    assert_eq!(h.gateway.components_for("Disc"), vec!["dxvk"]);
}

#[tokio::test]
async fn runtime_probe_covers_binaries_with_empty_import_tables() {
    let h = harness();
    let target = h.dir.path().join("data/packed.exe");
    write_synthetic_pe(&target, &[]);
    *h.gateway.probe_response.lock().unwrap() = ImportProbe {
        loaded: vec!["xinput1_3.dll".to_string()],
        missing: vec!["openal32.dll".to_string()],
    };

    let outcome = h
        .service
        .install(InstallRequest::new(&target).with_bottle("Packed"))
        .await;

    assert!(outcome.is_success(), "outcome: {outcome:?}");
    let components = h.gateway.components_for("Packed");
    assert!(components.contains(&"xinput".to_string()));
    assert!(components.contains(&"openal".to_string()));
}

#[tokio::test]
async fn concurrent_installs_into_one_bottle_serialize() {
    let h = harness();
    let first = h.dir.path().join("data/a.exe");
    let second = h.dir.path().join("data/b.exe");
    write_synthetic_pe(&first, &["kernel32.dll"]);
    write_synthetic_pe(&second, &["kernel32.dll"]);

    let (a, b) = tokio::join!(
        h.service
            .install(InstallRequest::new(&first).with_bottle("Shared")),
        h.service
            .install(InstallRequest::new(&second).with_bottle("Shared")),
    );

    // The second request queues behind the lease instead of failing.
    assert!(a.is_success(), "outcome: {a:?}");
    assert!(b.is_success(), "outcome: {b:?}");
    assert_eq!(h.gateway.created_count.load(Ordering::SeqCst), 1);
    assert_eq!(h.gateway.execution_count(), 2);
}

#[tokio::test]
async fn invalid_target_is_rejected_at_classification() {
    let h = harness();
    let outcome = h
        .service
        .install(InstallRequest::new("/nowhere/at/all.exe"))
        .await;
    assert_eq!(outcome.failed_stage(), Some(InstallStage::Classification));
}

#[tokio::test]
async fn dependency_failure_stops_before_execution() {
    let h = harness();
    let target = h.dir.path().join("data/setup.exe");
    write_synthetic_pe(&target, &["msvcp140.dll"]);
    *h.gateway.fail_component.lock().unwrap() = Some("vcrun2019".to_string());

    let outcome = h
        .service
        .install(InstallRequest::new(&target).with_bottle("Broken"))
        .await;

    assert_eq!(outcome.failed_stage(), Some(InstallStage::Dependencies));
    assert_eq!(h.gateway.execution_count(), 0);
}

#[tokio::test]
async fn cancellation_aborts_before_the_next_stage() {
    let h = harness();
    let target = h.dir.path().join("data/setup.exe");
    write_synthetic_pe(&target, &["kernel32.dll"]);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let outcome = h
        .service
        .install_cancellable(InstallRequest::new(&target).with_bottle("Halted"), cancel)
        .await;

    match outcome.failed_stage() {
        Some(stage) => assert_eq!(stage, InstallStage::Environment),
        None => panic!("cancelled install reported success"),
    }
    assert_eq!(h.gateway.execution_count(), 0);

    // Nothing was mutated; a fresh run goes through.
    let retry = h
        .service
        .install(InstallRequest::new(&target).with_bottle("Halted"))
        .await;
    assert!(retry.is_success(), "outcome: {retry:?}");
}

#[tokio::test]
async fn baseline_components_seed_only_fresh_environments() {
    let h = harness_with(|config| {
        config.baseline_components =
            vec!["dxvk".to_string(), "vcrun2019".to_string(), "d3dx9".to_string()];
    });
    let target = h.dir.path().join("data/setup.exe");
    write_synthetic_pe(&target, &["kernel32.dll"]);
    let request = InstallRequest::new(&target).with_bottle("Seeded");

    assert!(h.service.install(request.clone()).await.is_success());
    assert_eq!(
        h.gateway.components_for("Seeded"),
        vec!["dxvk", "vcrun2019", "d3dx9"]
    );
    assert_eq!(h.gateway.sanitized.lock().unwrap().len(), 1);

    // Reuse: no re-seeding, no re-sanitizing.
    assert!(h.service.install(request).await.is_success());
    assert_eq!(h.gateway.components_for("Seeded").len(), 3);
    assert_eq!(h.gateway.sanitized.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failure_carries_typed_error_detail() {
    let h = harness();
    let target = h.dir.path().join("data/setup.exe");
    write_synthetic_pe(&target, &["msvcp140.dll"]);
    *h.gateway.fail_component.lock().unwrap() = Some("vcrun2019".to_string());

    let outcome = h
        .service
        .install(InstallRequest::new(&target).with_bottle("Typed"))
        .await;

    match outcome {
        corkscrew::models::InstallOutcome::Failed { error, .. } => {
            assert!(matches!(
                error,
                CorkscrewError::DependencyInstall { ref component, .. } if component == "vcrun2019"
            ));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
