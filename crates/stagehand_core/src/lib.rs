//! # stagehand_core - Stagehand Core
//!
//! Small shared primitives used by every other Stagehand crate:
//! - **Thread affinity**: the control-thread guard every entry point checks
//! - **Operation ids**: identifiers for accepted load/unload operations
//! - **Load mode**: single (replace everything) or additive
//! - **Errors**: the misuse / backend-fault taxonomy

pub mod error;
pub mod id;
pub mod mode;
pub mod thread;

pub use error::*;
pub use id::*;
pub use mode::*;
pub use thread::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{HostError, Result, StagehandError};
    pub use crate::id::{OperationId, OperationIdGenerator};
    pub use crate::mode::LoadSceneMode;
    pub use crate::thread::ThreadAffinity;
}
