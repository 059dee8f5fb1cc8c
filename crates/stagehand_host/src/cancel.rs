//! Cooperative cancellation
//!
//! Cancelling only trips the token. Running work observes it at its next
//! checkpoint; nothing is preempted. The token itself comes from
//! `tokio_util` and works without a runtime.

use thiserror::Error;

pub use tokio_util::sync::CancellationToken;

/// Returned by [`Checkpoint::check`] once cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Checkpoint for cooperative loops
pub trait Checkpoint {
    /// `Err(Cancelled)` once cancellation was requested
    fn check(&self) -> Result<(), Cancelled>;
}

impl Checkpoint for CancellationToken {
    #[inline]
    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
