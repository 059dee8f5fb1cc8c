//! # stagehand_host - Host Collaborators
//!
//! Everything the scene transition engine talks to but does not own:
//!
//! ```text
//! tick(dt) ──► FrameClock ──► drain posted jobs ──► HostSystems update ──► poll woken tasks
//!                                   ▲                      │
//!                      ControlContext::post          AsyncOperation / AsyncHandle
//!                     (any thread, Send jobs)        progress + completion flags
//! ```
//!
//! The scheduler is single threaded and cooperative: a task runs until it
//! awaits [`yield_now`] and resumes on the next tick, on the same thread.
//! The two scene backends only expose polling APIs, advanced once per tick.

pub mod addressables;
pub mod cancel;
pub mod clock;
pub mod operation;
pub mod scene;
pub mod scene_manager;
pub mod scheduler;
pub mod world;

pub use addressables::AddressablesHost;
pub use cancel::{CancellationToken, Cancelled, Checkpoint};
pub use clock::{FrameClock, FrameTiming};
pub use operation::{AsyncHandle, AsyncOperation, STAGED_PROGRESS};
pub use scene::{Component, LoadProfile, Scene, SceneHandle, SceneInstance, SceneObject};
pub use scene_manager::SceneManagerHost;
pub use scheduler::{yield_now, ControlContext, HostScheduler, HostSystem, LocalSpawner, YieldNow};
pub use world::SceneWorld;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::addressables::AddressablesHost;
    pub use crate::cancel::{CancellationToken, Checkpoint};
    pub use crate::scene::{LoadProfile, Scene, SceneInstance};
    pub use crate::scene_manager::SceneManagerHost;
    pub use crate::scheduler::{yield_now, ControlContext, HostScheduler};
    pub use crate::world::SceneWorld;
}
