//! Adapters from the host backends to one two-phase contract
//!
//! | Backend | Phase one ready | Commit | Phase two ready |
//! |---------|-----------------|--------|-----------------|
//! | Scene manager | progress >= 0.9 | allow activation | handle done |
//! | Addressables load | handle done | `activate_async` | activation handle done |
//! | Addressables unload | handle done | nothing | immediately |

use std::sync::Arc;

use stagehand_core::{HostError, LoadSceneMode};
use stagehand_host::{
    AddressablesHost, AsyncHandle, AsyncOperation, Scene, SceneInstance, SceneManagerHost,
    STAGED_PROGRESS,
};

/// Which host backend an operation runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Progress-based scene manager
    SceneManager,
    /// Address-keyed addressables
    Addressables,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SceneManager => write!(f, "scene-manager"),
            Self::Addressables => write!(f, "addressables"),
        }
    }
}

/// A backend request seen as staged-load then activation
///
/// The polling state machine is written once against this trait.
pub trait TwoPhaseOperation {
    /// Result handed to the completion callback
    type Output;

    /// Backend this operation talks to
    fn backend(&self) -> BackendKind;

    /// Issue the backend request
    fn begin(&mut self) -> Result<(), HostError>;

    /// Phase-one readiness
    fn poll_staged(&self) -> bool;

    /// Release activation
    fn commit(&mut self) -> Result<(), HostError>;

    /// Phase-two readiness
    fn poll_activated(&self) -> bool;

    /// Produce the result
    fn finish(self) -> Result<Self::Output, HostError>;
}

fn not_started(what: &str) -> HostError {
    HostError::InvalidHandle(format!("{} was not started", what))
}

/// Scene-manager load by name
pub struct SceneManagerLoad {
    host: Arc<SceneManagerHost>,
    name: String,
    mode: LoadSceneMode,
    op: Option<AsyncOperation>,
}

impl SceneManagerLoad {
    pub fn new(host: Arc<SceneManagerHost>, name: impl Into<String>, mode: LoadSceneMode) -> Self {
        Self {
            host,
            name: name.into(),
            mode,
            op: None,
        }
    }
}

impl TwoPhaseOperation for SceneManagerLoad {
    type Output = Scene;

    fn backend(&self) -> BackendKind {
        BackendKind::SceneManager
    }

    fn begin(&mut self) -> Result<(), HostError> {
        let op = self.host.load_scene_async(&self.name, self.mode)?;
        op.set_allow_scene_activation(false);
        self.op = Some(op);
        Ok(())
    }

    fn poll_staged(&self) -> bool {
        self.op
            .as_ref()
            .map_or(false, |op| op.progress() >= STAGED_PROGRESS)
    }

    fn commit(&mut self) -> Result<(), HostError> {
        let op = self.op.as_ref().ok_or_else(|| not_started("scene load"))?;
        op.set_allow_scene_activation(true);
        Ok(())
    }

    fn poll_activated(&self) -> bool {
        self.op.as_ref().map_or(false, AsyncOperation::is_done)
    }

    fn finish(self) -> Result<Scene, HostError> {
        self.host
            .get_scene_by_name(&self.name)
            .ok_or(HostError::SceneNotLoaded(self.name))
    }
}

/// Scene-manager unload
pub struct SceneManagerUnload {
    host: Arc<SceneManagerHost>,
    scene: Scene,
    op: Option<AsyncOperation>,
}

impl SceneManagerUnload {
    pub fn new(host: Arc<SceneManagerHost>, scene: Scene) -> Self {
        Self {
            host,
            scene,
            op: None,
        }
    }
}

impl TwoPhaseOperation for SceneManagerUnload {
    type Output = ();

    fn backend(&self) -> BackendKind {
        BackendKind::SceneManager
    }

    fn begin(&mut self) -> Result<(), HostError> {
        let op = self.host.unload_scene_async(&self.scene)?;
        op.set_allow_scene_activation(false);
        self.op = Some(op);
        Ok(())
    }

    fn poll_staged(&self) -> bool {
        self.op
            .as_ref()
            .map_or(false, |op| op.progress() >= STAGED_PROGRESS)
    }

    fn commit(&mut self) -> Result<(), HostError> {
        let op = self.op.as_ref().ok_or_else(|| not_started("scene unload"))?;
        op.set_allow_scene_activation(true);
        Ok(())
    }

    fn poll_activated(&self) -> bool {
        self.op.as_ref().map_or(false, AsyncOperation::is_done)
    }

    fn finish(self) -> Result<(), HostError> {
        Ok(())
    }
}

/// Addressable load; activation is a second request
pub struct AddressableLoad {
    host: Arc<AddressablesHost>,
    address: String,
    mode: LoadSceneMode,
    handle: Option<AsyncHandle<SceneInstance>>,
    activation: Option<AsyncOperation>,
}

impl AddressableLoad {
    pub fn new(host: Arc<AddressablesHost>, address: impl Into<String>, mode: LoadSceneMode) -> Self {
        Self {
            host,
            address: address.into(),
            mode,
            handle: None,
            activation: None,
        }
    }
}

impl TwoPhaseOperation for AddressableLoad {
    type Output = SceneInstance;

    fn backend(&self) -> BackendKind {
        BackendKind::Addressables
    }

    fn begin(&mut self) -> Result<(), HostError> {
        self.handle = Some(self.host.load_scene_async(&self.address, self.mode)?);
        Ok(())
    }

    fn poll_staged(&self) -> bool {
        self.handle.as_ref().map_or(false, AsyncHandle::is_done)
    }

    fn commit(&mut self) -> Result<(), HostError> {
        let instance = self
            .handle
            .as_ref()
            .and_then(AsyncHandle::result)
            .ok_or_else(|| not_started("addressable load"))?;
        self.activation = Some(instance.activate_async()?);
        Ok(())
    }

    fn poll_activated(&self) -> bool {
        self.activation.as_ref().map_or(false, AsyncOperation::is_done)
    }

    fn finish(self) -> Result<SceneInstance, HostError> {
        self.handle
            .as_ref()
            .and_then(AsyncHandle::result)
            .ok_or_else(|| not_started("addressable load"))
    }
}

/// Addressable unload; the host exposes a single handle
pub struct AddressableUnload {
    host: Arc<AddressablesHost>,
    instance: SceneInstance,
    handle: Option<AsyncHandle<()>>,
}

impl AddressableUnload {
    pub fn new(host: Arc<AddressablesHost>, instance: SceneInstance) -> Self {
        Self {
            host,
            instance,
            handle: None,
        }
    }
}

impl TwoPhaseOperation for AddressableUnload {
    type Output = ();

    fn backend(&self) -> BackendKind {
        BackendKind::Addressables
    }

    fn begin(&mut self) -> Result<(), HostError> {
        self.handle = Some(self.host.unload_scene_async(&self.instance)?);
        Ok(())
    }

    fn poll_staged(&self) -> bool {
        self.handle.as_ref().map_or(false, AsyncHandle::is_done)
    }

    fn commit(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn poll_activated(&self) -> bool {
        true
    }

    fn finish(self) -> Result<(), HostError> {
        Ok(())
    }
}
