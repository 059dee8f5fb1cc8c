//! Addressable-content backend
//!
//! Completion-only loading. A load resolves to a staged [`SceneInstance`];
//! making it live is a second, explicit `activate_async` call with its own
//! handle. Unloads resolve a unit handle.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stagehand_core::{HostError, LoadSceneMode};

use crate::operation::{AsyncHandle, AsyncOperation, OperationDriver, STAGED_PROGRESS};
use crate::scene::{Activator, LoadProfile, Scene, SceneInstance, SceneObject};
use crate::scheduler::HostSystem;
use crate::world::SceneWorld;

/// Address-keyed scene loading backend
pub struct AddressablesHost {
    world: SceneWorld,
    driver: OperationDriver,
    profiles: RwLock<HashMap<String, LoadProfile>>,
}

impl AddressablesHost {
    /// Create a backend over a scene world
    pub fn new(world: SceneWorld) -> Self {
        Self {
            world,
            driver: OperationDriver::default(),
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Declare a loadable address
    pub fn register(&self, address: impl Into<String>, profile: LoadProfile) {
        self.profiles.write().insert(address.into(), profile);
    }

    /// The world this backend loads into
    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    /// Start loading an addressable scene without activating it
    pub fn load_scene_async(
        &self,
        address: &str,
        mode: LoadSceneMode,
    ) -> Result<AsyncHandle<SceneInstance>, HostError> {
        let profile = self
            .profiles
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| HostError::SceneNotFound(address.to_string()))?;

        let activator = Arc::new(StagedActivation {
            world: self.world.clone(),
            driver: self.driver.clone(),
            mode,
            roots: Mutex::new(Some(profile.roots)),
            activate_frames: profile.activate_frames,
            started: AtomicBool::new(false),
        });
        let instance = SceneInstance::new(self.world.allocate(address), activator);

        let handle = AsyncHandle::pending();
        let resolver = handle.clone();
        let mut result = Some(instance);
        self.driver.push(countdown(profile.stage_frames, move || {
            if let Some(instance) = result.take() {
                resolver.resolve(instance);
            }
        }));
        log::debug!("Addressables: load '{}' requested [{}]", address, mode);
        Ok(handle)
    }

    /// Start unloading a live addressable scene
    pub fn unload_scene_async(&self, instance: &SceneInstance) -> Result<AsyncHandle<()>, HostError> {
        let scene = instance.scene();
        if !self.world.is_loaded(scene) {
            return Err(HostError::SceneNotLoaded(scene.name.clone()));
        }

        let stage_frames = self
            .profiles
            .read()
            .get(&scene.name)
            .map(|p| p.stage_frames)
            .unwrap_or_default();

        let handle = AsyncHandle::pending();
        let resolver = handle.clone();
        let world = self.world.clone();
        let target = scene.clone();
        self.driver.push(countdown(stage_frames, move || {
            world.remove(&target);
            resolver.resolve(());
        }));
        log::debug!("Addressables: unload '{}' requested", scene.name);
        Ok(handle)
    }

    /// Operations still in progress
    pub fn pending_operations(&self) -> usize {
        self.driver.pending()
    }
}

impl HostSystem for AddressablesHost {
    fn update(&self) {
        self.driver.step();
    }
}

/// Stepper that runs `finish` on its `frames`-th update (at least one)
fn countdown<F>(frames: u32, finish: F) -> Box<dyn FnMut() -> bool + Send>
where
    F: FnMut() + Send + 'static,
{
    let mut finish = finish;
    let mut elapsed = 0;
    Box::new(move || {
        elapsed += 1;
        if elapsed < frames.max(1) {
            return false;
        }
        finish();
        true
    })
}

struct StagedActivation {
    world: SceneWorld,
    driver: OperationDriver,
    mode: LoadSceneMode,
    roots: Mutex<Option<Vec<SceneObject>>>,
    activate_frames: u32,
    started: AtomicBool,
}

impl Activator for StagedActivation {
    fn activate(&self, scene: &Scene) -> Result<AsyncOperation, HostError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HostError::InvalidHandle(format!(
                "activation of '{}' already started",
                scene.name
            )));
        }

        let op = AsyncOperation::new(STAGED_PROGRESS, true);
        let view = op.clone();
        let world = self.world.clone();
        let mode = self.mode;
        let mut roots = self.roots.lock().take();
        let mut target = Some(scene.clone());
        self.driver.push(countdown(self.activate_frames, move || {
            if let Some(scene) = target.take() {
                world.activate(scene, mode, roots.take().unwrap_or_default());
            }
            view.complete();
        }));
        log::debug!("Addressables: activation of '{}' started", scene.name);
        Ok(op)
    }
}
