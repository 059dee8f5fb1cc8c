//! Scene-manager backend
//!
//! Progress-based loading: a request climbs to [`STAGED_PROGRESS`] and holds
//! there until `allow_scene_activation` is set, then finishes activating.
//! Unloads report through the same handle shape.

use parking_lot::RwLock;
use std::collections::HashMap;

use stagehand_core::{HostError, LoadSceneMode};

use crate::operation::{staging_progress, AsyncOperation, OperationDriver, STAGED_PROGRESS};
use crate::scene::{LoadProfile, Scene, SceneObject};
use crate::scheduler::HostSystem;
use crate::world::SceneWorld;

/// Progress-reporting scene loading backend
pub struct SceneManagerHost {
    world: SceneWorld,
    driver: OperationDriver,
    profiles: RwLock<HashMap<String, LoadProfile>>,
}

impl SceneManagerHost {
    /// Create a backend over a scene world
    pub fn new(world: SceneWorld) -> Self {
        Self {
            world,
            driver: OperationDriver::default(),
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Declare a loadable scene
    pub fn register(&self, name: impl Into<String>, profile: LoadProfile) {
        self.profiles.write().insert(name.into(), profile);
    }

    /// The world this backend loads into
    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    /// Start loading a scene by name
    pub fn load_scene_async(
        &self,
        name: &str,
        mode: LoadSceneMode,
    ) -> Result<AsyncOperation, HostError> {
        let profile = self
            .profiles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::SceneNotFound(name.to_string()))?;

        let scene = self.world.allocate(name);
        let world = self.world.clone();
        let op = gated_operation(&self.driver, &profile, move |roots| {
            world.activate(scene, mode, roots);
        });
        log::debug!("Scene manager: load '{}' requested [{}]", name, mode);
        Ok(op)
    }

    /// Start unloading a live scene
    pub fn unload_scene_async(&self, scene: &Scene) -> Result<AsyncOperation, HostError> {
        if !self.world.is_loaded(scene) {
            return Err(HostError::SceneNotLoaded(scene.name.clone()));
        }

        let profile = self
            .profiles
            .read()
            .get(&scene.name)
            .map(|p| LoadProfile::new(p.stage_frames, p.activate_frames))
            .unwrap_or_default();

        let target = scene.clone();
        let world = self.world.clone();
        let op = gated_operation(&self.driver, &profile, move |_| {
            world.remove(&target);
        });
        log::debug!("Scene manager: unload '{}' requested", scene.name);
        Ok(op)
    }

    /// Most recently loaded live scene with this name
    pub fn get_scene_by_name(&self, name: &str) -> Option<Scene> {
        self.world.find_by_name(name)
    }

    /// Operations still in progress
    pub fn pending_operations(&self) -> usize {
        self.driver.pending()
    }
}

impl HostSystem for SceneManagerHost {
    fn update(&self) {
        self.driver.step();
    }
}

/// Build a progress operation that stages, waits for the gate, then applies `finish`
fn gated_operation<F>(driver: &OperationDriver, profile: &LoadProfile, finish: F) -> AsyncOperation
where
    F: FnOnce(Vec<SceneObject>) + Send + 'static,
{
    let stage_frames = profile.stage_frames;
    let activate_frames = profile.activate_frames;
    let op = AsyncOperation::new(staging_progress(0, stage_frames), true);

    let view = op.clone();
    let mut roots = Some(profile.roots.clone());
    let mut finish = Some(finish);
    let mut staged = 0;
    let mut activated = 0;
    driver.push(Box::new(move || {
        if staged < stage_frames {
            staged += 1;
            view.set_progress(staging_progress(staged, stage_frames));
            return false;
        }
        if !view.allow_scene_activation() {
            return false;
        }
        activated += 1;
        if activated < activate_frames {
            let fraction = activated as f32 / activate_frames as f32;
            view.set_progress(STAGED_PROGRESS + (1.0 - STAGED_PROGRESS) * fraction);
            return false;
        }
        if let Some(finish) = finish.take() {
            finish(roots.take().unwrap_or_default());
        }
        view.complete();
        true
    }));
    op
}
