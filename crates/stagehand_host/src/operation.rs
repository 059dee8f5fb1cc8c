//! Polling handles returned by the scene backends
//!
//! Handles are read-mostly views. The owning backend advances them once per
//! host frame through its [`OperationDriver`].

use parking_lot::Mutex;
use std::sync::Arc;

/// Progress a scene-manager load reports once staged but not activated
pub const STAGED_PROGRESS: f32 = 0.9;

#[derive(Debug)]
struct OperationState {
    progress: f32,
    allow_scene_activation: bool,
    is_done: bool,
}

/// Progress-reporting handle with an activation gate
#[derive(Clone)]
pub struct AsyncOperation {
    state: Arc<Mutex<OperationState>>,
}

impl AsyncOperation {
    pub(crate) fn new(progress: f32, allow_scene_activation: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(OperationState {
                progress,
                allow_scene_activation,
                is_done: false,
            })),
        }
    }

    /// Load progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    /// Whether reaching full progress may finalize the operation
    pub fn allow_scene_activation(&self) -> bool {
        self.state.lock().allow_scene_activation
    }

    /// Gate finalization
    pub fn set_allow_scene_activation(&self, allow: bool) {
        self.state.lock().allow_scene_activation = allow;
    }

    /// Check if the operation finished
    pub fn is_done(&self) -> bool {
        self.state.lock().is_done
    }

    pub(crate) fn set_progress(&self, progress: f32) {
        self.state.lock().progress = progress.clamp(0.0, 1.0);
    }

    pub(crate) fn complete(&self) {
        let mut state = self.state.lock();
        state.progress = 1.0;
        state.is_done = true;
    }
}

impl std::fmt::Debug for AsyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AsyncOperation")
            .field("progress", &state.progress)
            .field("allow_scene_activation", &state.allow_scene_activation)
            .field("is_done", &state.is_done)
            .finish()
    }
}

/// Completion-only handle carrying a result
pub struct AsyncHandle<T> {
    result: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for AsyncHandle<T> {
    fn clone(&self) -> Self {
        Self {
            result: Arc::clone(&self.result),
        }
    }
}

impl<T: Clone> AsyncHandle<T> {
    pub(crate) fn pending() -> Self {
        Self {
            result: Arc::new(Mutex::new(None)),
        }
    }

    /// Check if the operation finished
    pub fn is_done(&self) -> bool {
        self.result.lock().is_some()
    }

    /// The result, once done
    pub fn result(&self) -> Option<T> {
        self.result.lock().clone()
    }

    pub(crate) fn resolve(&self, value: T) {
        *self.result.lock() = Some(value);
    }
}

impl<T> std::fmt::Debug for AsyncHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("is_done", &self.result.lock().is_some())
            .finish()
    }
}

/// One frame of work; returns true once finished
pub(crate) type Stepper = Box<dyn FnMut() -> bool + Send>;

/// Advances a backend's outstanding operations once per frame
#[derive(Clone, Default)]
pub(crate) struct OperationDriver {
    steppers: Arc<Mutex<Vec<Stepper>>>,
}

impl OperationDriver {
    pub(crate) fn push(&self, stepper: Stepper) {
        self.steppers.lock().push(stepper);
    }

    pub(crate) fn step(&self) {
        self.steppers.lock().retain_mut(|step| !step());
    }

    pub(crate) fn pending(&self) -> usize {
        self.steppers.lock().len()
    }
}

/// Staging progress after `staged` of `total` frames
pub(crate) fn staging_progress(staged: u32, total: u32) -> f32 {
    if staged >= total {
        STAGED_PROGRESS
    } else {
        STAGED_PROGRESS * staged as f32 / total as f32
    }
}
