//! Core types shared across the installer workflow
//!
//! This module holds the error taxonomy ([`error`]) and the cooperative
//! cancellation flag used by the installer state machines. Everything here
//! is dependency-free with respect to the rest of the crate so any module
//! can use it without cycles.

pub mod error;

pub use error::{
    CorkscrewError, ErrorContext, InstallStage, StageResultExt, StagedFailure, user_friendly_error,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag for an install workflow.
///
/// Cancellation is only observed at the checkpoints between installer
/// states - an in-flight external call is awaited (or times out) before
/// the flag is consulted again. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Checkpoint before entering `stage`: fails with
    /// [`CorkscrewError::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&self, stage: InstallStage) -> Result<(), CorkscrewError> {
        if self.is_cancelled() {
            Err(CorkscrewError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_trips_checkpoint() {
        let flag = CancelFlag::new();
        assert!(flag.checkpoint(InstallStage::Environment).is_ok());

        flag.cancel();
        let err = flag.checkpoint(InstallStage::Execution).unwrap_err();
        assert!(matches!(
            err,
            CorkscrewError::Cancelled {
                stage: InstallStage::Execution
            }
        ));
    }

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
