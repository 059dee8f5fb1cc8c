//! Scene controller
//!
//! Drives the three demo flows against the transition engine and keeps the
//! loading indicator in step with it:
//!
//! - **change scene**: single load of the configured next scene
//! - **load additive**: additive load, trimmed on arrival
//! - **unload additive**: unloads whatever the additive flow loaded

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use stagehand_core::{LoadSceneMode, OperationId, StagehandError};
use stagehand_host::{Scene, SceneInstance, SceneWorld};
use stagehand_loader::{SceneTransitionEngine, UnloadCallback};

use crate::boot_config::{DemoConfig, LoaderType};
use crate::indicator::LoadingIndicator;
use crate::trim::{mute_main_camera, trim_additive_scene};

/// Controller errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// An additive scene is already loaded
    #[error("An additive scene is already loaded")]
    NotReady,

    /// Nothing to unload
    #[error("No additive scene loaded")]
    NoScene,

    /// The engine refused the request
    #[error(transparent)]
    Engine(#[from] StagehandError),
}

/// Additive scene as returned by whichever backend loaded it
#[derive(Debug, Clone)]
pub enum AdditiveScene {
    /// Loaded by the scene manager
    Scene(Scene),
    /// Loaded through addressables
    Instance(SceneInstance),
}

impl AdditiveScene {
    /// The underlying host scene
    pub fn scene(&self) -> &Scene {
        match self {
            Self::Scene(scene) => scene,
            Self::Instance(instance) => instance.scene(),
        }
    }
}

/// Flow currently waiting on the engine
#[derive(Debug, Clone, Copy)]
struct ActiveFlow {
    name: &'static str,
    yields: u32,
}

/// Scene controller
pub struct SceneController {
    engine: SceneTransitionEngine,
    settings: DemoConfig,
    world: SceneWorld,
    additive: Arc<Mutex<Option<AdditiveScene>>>,
    indicator: LoadingIndicator,
    flow: Option<ActiveFlow>,
}

impl SceneController {
    /// Create a controller over `engine`
    pub fn new(engine: SceneTransitionEngine, settings: DemoConfig) -> Self {
        let world = engine.backends().world().clone();
        Self {
            engine,
            settings,
            world,
            additive: Arc::new(Mutex::new(None)),
            indicator: LoadingIndicator::new(),
            flow: None,
        }
    }

    /// Replace every loaded scene with the configured next scene
    pub fn change_scene(&mut self) -> Result<OperationId, ControllerError> {
        // A single load drops whatever was loaded additively.
        let additive = self.additive.clone();
        let id = match self.settings.loader_type {
            LoaderType::SceneManager => self.engine.load_scene(
                self.settings.next_scene_name.clone(),
                LoadSceneMode::Single,
                Some(Box::new(move |scene| {
                    log::info!("Now in '{}'", scene.name());
                    additive.lock().take();
                })),
            )?,
            LoaderType::Addressables => self.engine.load_scene_addressable(
                self.settings.next_scene_address.clone(),
                LoadSceneMode::Single,
                Some(Box::new(move |instance| {
                    log::info!("Now in '{}'", instance.scene().name());
                    additive.lock().take();
                })),
            )?,
        };
        self.begin_flow("ChangeScene");
        Ok(id)
    }

    /// Load the configured additive scene and trim it
    pub fn load_additive(&mut self) -> Result<OperationId, ControllerError> {
        if self.additive.lock().is_some() {
            return Err(ControllerError::NotReady);
        }

        let slot = self.additive.clone();
        let world = self.world.clone();
        let store = move |loaded: AdditiveScene| {
            if let Some(report) = world.with_roots_mut(loaded.scene(), trim_additive_scene) {
                log::info!(
                    "Additive scene '{}' loaded, removed {} listener(s) and {} object(s)",
                    loaded.scene().name(),
                    report.listeners_removed,
                    report.objects_removed
                );
            }
            *slot.lock() = Some(loaded);
        };

        let id = match self.settings.loader_type {
            LoaderType::SceneManager => self.engine.load_scene(
                self.settings.additive_scene_name.clone(),
                LoadSceneMode::Additive,
                Some(Box::new(move |scene| store(AdditiveScene::Scene(scene)))),
            )?,
            LoaderType::Addressables => self.engine.load_scene_addressable(
                self.settings.additive_scene_address.clone(),
                LoadSceneMode::Additive,
                Some(Box::new(move |instance| store(AdditiveScene::Instance(instance)))),
            )?,
        };
        self.mute_base_scene();
        self.begin_flow("LoadAdditive");
        Ok(id)
    }

    /// Unload the scene loaded by [`Self::load_additive`]
    pub fn unload_additive(&mut self) -> Result<OperationId, ControllerError> {
        let loaded = self.additive.lock().clone().ok_or(ControllerError::NoScene)?;

        let slot = self.additive.clone();
        let on_unloaded: UnloadCallback = Box::new(move || {
            log::info!("Additive scene unloaded");
            slot.lock().take();
        });

        let id = match &loaded {
            AdditiveScene::Scene(scene) => self.engine.unload_scene(scene, Some(on_unloaded))?,
            AdditiveScene::Instance(instance) => self
                .engine
                .unload_scene_addressable(instance, Some(on_unloaded))?,
        };
        self.begin_flow("UnloadAdditive");
        Ok(id)
    }

    /// Set the engine's debug delay from free text; unparsable input is ignored
    pub fn set_debug_delay_text(&self, text: &str) -> bool {
        match text.trim().parse::<u32>() {
            Ok(millis) => {
                self.engine.set_debug_delay(millis);
                true
            }
            Err(_) => false,
        }
    }

    /// Per-frame update, after the scheduler has ticked
    pub fn update(&mut self, delta_time: Duration) {
        let processing = self.engine.is_processing();
        self.indicator.set_active(processing);
        self.indicator.update(delta_time);

        let yield_logging = self.engine.debug_yield_logging();
        if let Some(flow) = self.flow.as_mut() {
            if processing {
                if yield_logging {
                    log::info!("SceneController {} yield:{}", flow.name, flow.yields);
                }
                flow.yields += 1;
            } else {
                log::debug!("SceneController {} done after {} frame(s)", flow.name, flow.yields);
                self.flow = None;
            }
        }
    }

    pub fn indicator(&self) -> &LoadingIndicator {
        &self.indicator
    }

    /// The additive scene currently loaded, if any
    pub fn additive_scene(&self) -> Option<AdditiveScene> {
        self.additive.lock().clone()
    }

    /// Turn off the base scene's camera listener before the additive scene arrives
    fn mute_base_scene(&self) {
        for scene in self.world.loaded_scenes() {
            if self.world.with_roots_mut(&scene, |roots| mute_main_camera(roots)) == Some(true) {
                log::info!("Audio listener disabled on '{}'", scene.name());
                return;
            }
        }
    }

    fn begin_flow(&mut self, name: &'static str) {
        self.flow = Some(ActiveFlow { name, yields: 0 });
        self.indicator.set_active(true);
    }
}
