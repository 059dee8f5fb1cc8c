//! # stagehand_loader - Scene Transition Engine
//!
//! Turns the host's polling-only scene APIs into cancellable operations that
//! run on the control thread, one at a time.
//!
//! ## Lifecycle of an operation
//!
//! ```text
//! load_scene() ──► affinity + single-flight check ──► post to control context
//!                                                         │
//!                     ┌───────────────────────────────────┘
//!                     ▼
//!   Idle ─► Phase1Polling ─► CommitPoint ─► Phase2Polling ─► Completed
//!                │                              │
//!                └──────────► Cancelled ◄───────┘
//! ```
//!
//! Phase one waits until the content is staged (and any debug delay has
//! elapsed); the commit point releases activation; phase two waits until the
//! scene is live. The completion callback runs on the control thread.
//!
//! ## Key Invariants
//!
//! 1. **Single flight** - at most one operation is in flight
//! 2. **Control thread only** - every entry point and every poll runs there
//! 3. **Ordered phases** - staged, then commit, then activated, then callback
//! 4. **Cancellation is an outcome** - never surfaced as an error

pub mod backend;
pub mod config;
pub mod engine;
pub mod event;
pub mod machine;

pub use backend::{
    AddressableLoad, AddressableUnload, BackendKind, SceneManagerLoad, SceneManagerUnload,
    TwoPhaseOperation,
};
pub use config::{HandOff, LoaderConfig};
pub use engine::{
    LoadCallback, OperationSummary, SceneBackends, SceneTransitionEngine, UnloadCallback,
};
pub use event::{Outcome, TransitionEvent, TransitionEventKind};
pub use machine::Interrupt;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::{HandOff, LoaderConfig};
    pub use crate::engine::{SceneBackends, SceneTransitionEngine};
    pub use crate::event::{Outcome, TransitionEvent, TransitionEventKind};
    pub use stagehand_core::prelude::*;
}
