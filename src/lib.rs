//! Corkscrew - installer orchestration for Windows applications in Wine
//! bottles
//!
//! Corkscrew turns a structured install request - a filesystem path plus
//! optional metadata extracted from natural-language intent - into a
//! finished install inside an isolated Wine-compatibility environment
//! ("bottle") managed by an external environment manager. It decides
//! which installation strategy applies, drives a multi-step workflow
//! whose steps can fail independently, and keeps shared mutable
//! environments safe under concurrent requests.
//!
//! # Architecture Overview
//!
//! ```text
//! InstallRequest
//!       |
//!       v
//!  [service]  -- per-bottle lease, outcome folding
//!       |
//!   [router]  -- filesystem-derived classification, hints advisory
//!       |
//!  [installer::file | installer::folder]   state machines
//!       |                 |
//!  [resolver]        [installer::discovery]
//!       |
//!  [gateway]  -- typed boundary over bottles-cli / wine / winetricks
//!       |
//!  [shortcuts] -- native registry + manual sidecar, one entry per key
//! ```
//!
//! # Core Modules
//!
//! - [`service`] - the orchestration entry point and per-environment
//!   leases
//! - [`router`] - install strategy classification
//! - [`installer`] - the file-based and folder-based state machines
//! - [`resolver`] - PE import scanning and the dependency catalog
//! - [`gateway`] - the typed boundary over the external environment
//!   manager
//! - [`shortcuts`] - shortcut persistence across two backends
//! - [`models`] - shared request/report/outcome types
//! - [`core`] - error taxonomy and cancellation
//! - [`config`] - immutable runtime configuration
//! - [`cli`] - the `corkscrew` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use corkscrew::config::Config;
//! use corkscrew::gateway::BottlesGateway;
//! use corkscrew::models::InstallRequest;
//! use corkscrew::service::OrchestrationService;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let gateway = Arc::new(BottlesGateway::detect(Arc::new(config.clone()))?);
//! let service = OrchestrationService::new(config, gateway);
//!
//! let outcome = service
//!     .install(InstallRequest::new("/data/Game/setup.exe").with_bottle("Game"))
//!     .await;
//! if let Some(shortcut) = outcome.shortcut() {
//!     println!("installed; launch via '{}'", shortcut.display_name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design Notes
//!
//! - Classification never trusts the caller's hint: file-vs-folder is
//!   always re-derived from the live filesystem.
//! - All external interaction goes through one gateway trait with typed
//!   operations and typed errors, so both installers are testable
//!   against a fake.
//! - Failures short-circuit with their stage and leave external state
//!   as-is; resubmission is safe because environment creation and
//!   component installs are idempotent.

pub mod cli;
pub mod config;
pub mod core;
pub mod gateway;
pub mod installer;
pub mod models;
pub mod resolver;
pub mod router;
pub mod service;
pub mod shortcuts;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
