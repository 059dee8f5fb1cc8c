//! Loaded-scene registry shared by both backends

use parking_lot::Mutex;
use std::sync::Arc;

use stagehand_core::LoadSceneMode;

use crate::scene::{Scene, SceneHandle, SceneObject};

struct LoadedScene {
    scene: Scene,
    roots: Vec<SceneObject>,
}

#[derive(Default)]
struct WorldState {
    next_handle: u32,
    loaded: Vec<LoadedScene>,
}

/// The set of scenes currently live in the host
#[derive(Clone, Default)]
pub struct SceneWorld {
    state: Arc<Mutex<WorldState>>,
}

impl SceneWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a handle for a scene that is about to load
    pub fn allocate(&self, name: &str) -> Scene {
        let mut state = self.state.lock();
        state.next_handle += 1;
        Scene {
            handle: SceneHandle(state.next_handle),
            name: name.to_string(),
        }
    }

    /// Make a scene live
    pub fn activate(&self, scene: Scene, mode: LoadSceneMode, roots: Vec<SceneObject>) {
        let mut state = self.state.lock();
        if mode == LoadSceneMode::Single {
            state.loaded.clear();
        }
        log::debug!("Scene '{}' ({:?}) activated [{}]", scene.name, scene.handle, mode);
        state.loaded.push(LoadedScene { scene, roots });
    }

    /// Remove a live scene; returns false if it was not loaded
    pub fn remove(&self, scene: &Scene) -> bool {
        let mut state = self.state.lock();
        let before = state.loaded.len();
        state.loaded.retain(|s| s.scene.handle != scene.handle);
        before != state.loaded.len()
    }

    /// Check if a scene is live
    pub fn is_loaded(&self, scene: &Scene) -> bool {
        self.state
            .lock()
            .loaded
            .iter()
            .any(|s| s.scene.handle == scene.handle)
    }

    /// Most recently loaded live scene with this name
    pub fn find_by_name(&self, name: &str) -> Option<Scene> {
        self.state
            .lock()
            .loaded
            .iter()
            .rev()
            .find(|s| s.scene.name == name)
            .map(|s| s.scene.clone())
    }

    /// All live scenes, in load order
    pub fn loaded_scenes(&self) -> Vec<Scene> {
        self.state.lock().loaded.iter().map(|s| s.scene.clone()).collect()
    }

    /// Copy of a live scene's root objects
    pub fn root_objects(&self, scene: &Scene) -> Option<Vec<SceneObject>> {
        self.state
            .lock()
            .loaded
            .iter()
            .find(|s| s.scene.handle == scene.handle)
            .map(|s| s.roots.clone())
    }

    /// Mutate a live scene's root objects
    pub fn with_roots_mut<R>(
        &self,
        scene: &Scene,
        f: impl FnOnce(&mut Vec<SceneObject>) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        state
            .loaded
            .iter_mut()
            .find(|s| s.scene.handle == scene.handle)
            .map(|s| f(&mut s.roots))
    }
}
