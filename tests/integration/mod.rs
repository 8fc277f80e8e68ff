//! Integration suite
//!
//! Drives the orchestration service end-to-end against the scripted fake
//! gateway: real classification, real PE scanning, real sidecar files in
//! a temp directory - only the external environment manager is faked.

mod cli;
mod scenarios;
mod shortcut_invariants;

use std::sync::Arc;
use tempfile::TempDir;

use corkscrew::config::Config;
use corkscrew::service::OrchestrationService;
use corkscrew::test_utils::{FakeGateway, init_test_logging};

/// A service over a fake gateway, rooted in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub gateway: Arc<FakeGateway>,
    pub service: OrchestrationService,
}

/// Build a harness with no baseline seeding and no shortcut polling wait.
pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Build a harness after applying `adjust` to the configuration.
pub fn harness_with(adjust: impl FnOnce(&mut Config)) -> Harness {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let mut config = Config::rooted_at(dir.path());
    config.timeouts.shortcut_poll_secs = 0;
    adjust(&mut config);
    let gateway = Arc::new(FakeGateway::new(config.prefix_base.clone()));
    let service = OrchestrationService::new(config, gateway.clone());
    Harness {
        dir,
        gateway,
        service,
    }
}
