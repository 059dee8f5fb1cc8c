//! Scene model

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use stagehand_core::HostError;

use crate::operation::AsyncOperation;

/// Host-assigned scene handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SceneHandle(pub u32);

/// Reference to a scene known to the host
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scene {
    /// Handle
    pub handle: SceneHandle,
    /// Scene name
    pub name: String,
}

impl Scene {
    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Component attached to a scene object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Audio listener (only one may be active across loaded scenes)
    AudioListener,
    /// Input event dispatcher (only one may be active across loaded scenes)
    EventSystem,
    /// Camera
    Camera,
    /// Anything else
    Custom(String),
}

/// Object in a scene's hierarchy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Object name
    pub name: String,
    /// Attached components
    #[serde(default)]
    pub components: Vec<Component>,
    /// Child objects
    #[serde(default)]
    pub children: Vec<SceneObject>,
}

impl SceneObject {
    /// Create an empty object
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add a component
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Add a child
    pub fn with_child(mut self, child: SceneObject) -> Self {
        self.children.push(child);
        self
    }

    /// Check if this object carries the component
    pub fn has(&self, component: &Component) -> bool {
        self.components.contains(component)
    }

    /// Count matching components in this subtree
    pub fn count_in_tree(&self, component: &Component) -> usize {
        let own = self.components.iter().filter(|c| *c == component).count();
        own + self
            .children
            .iter()
            .map(|c| c.count_in_tree(component))
            .sum::<usize>()
    }
}

/// How a registered scene loads, in host frames
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProfile {
    /// Frames until the content is staged (progress 0.9 / handle done)
    #[serde(default)]
    pub stage_frames: u32,
    /// Frames from activation until the scene is live
    #[serde(default)]
    pub activate_frames: u32,
    /// Root objects instantiated when the scene activates
    #[serde(default)]
    pub roots: Vec<SceneObject>,
}

impl LoadProfile {
    /// Profile with the given timings and no content
    pub fn new(stage_frames: u32, activate_frames: u32) -> Self {
        Self {
            stage_frames,
            activate_frames,
            roots: Vec::new(),
        }
    }

    /// Set root objects
    pub fn with_roots(mut self, roots: Vec<SceneObject>) -> Self {
        self.roots = roots;
        self
    }
}

/// Deferred activation owned by a staged addressable scene
pub(crate) trait Activator: Send + Sync {
    fn activate(&self, scene: &Scene) -> Result<AsyncOperation, HostError>;
}

/// Staged result of an addressable scene load
#[derive(Clone)]
pub struct SceneInstance {
    scene: Scene,
    activator: Arc<dyn Activator>,
}

impl SceneInstance {
    pub(crate) fn new(scene: Scene, activator: Arc<dyn Activator>) -> Self {
        Self { scene, activator }
    }

    /// The underlying scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Start activating the staged scene
    ///
    /// Returns the phase-two handle. Fails if activation already started.
    pub fn activate_async(&self) -> Result<AsyncOperation, HostError> {
        self.activator.activate(&self.scene)
    }
}

impl PartialEq for SceneInstance {
    fn eq(&self, other: &Self) -> bool {
        self.scene == other.scene
    }
}

impl Eq for SceneInstance {}

impl std::fmt::Debug for SceneInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneInstance")
            .field("scene", &self.scene)
            .finish()
    }
}
