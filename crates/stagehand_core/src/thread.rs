//! Control-thread affinity guard
//!
//! The identity of the control thread is captured once, by whoever constructs
//! the guard on that thread (normally the bootstrap). Every engine entry point
//! checks it before touching any state.

use std::thread::{self, ThreadId};

use crate::error::{Result, StagehandError};

/// Records the designated control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    control: ThreadId,
}

impl ThreadAffinity {
    /// Capture the calling thread as the control thread
    pub fn capture() -> Self {
        let control = thread::current().id();
        log::debug!("Control thread captured: {:?}", control);
        Self { control }
    }

    /// Check if the caller is running on the control thread
    #[inline]
    pub fn is_control_thread(&self) -> bool {
        thread::current().id() == self.control
    }

    /// Reject callers that are not on the control thread
    pub fn ensure(&self, operation: &'static str) -> Result<()> {
        if self.is_control_thread() {
            return Ok(());
        }
        log::error!("{} should be called on the control thread", operation);
        Err(StagehandError::NotControlThread { operation })
    }

    /// Panic unless running on the control thread
    ///
    /// For accessors that have no error channel. A violation is a caller defect.
    #[track_caller]
    pub fn assert_control_thread(&self, operation: &'static str) {
        if !self.is_control_thread() {
            log::error!("{} should be called on the control thread", operation);
            panic!("{} should be called on the control thread", operation);
        }
    }
}
