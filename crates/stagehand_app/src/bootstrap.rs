//! Bootstrap
//!
//! Builds and owns every long-lived piece of the demo on the control thread:
//! the thread-affinity guard, the host scheduler, both scene backends, the
//! transition engine and the scene controller. Nothing here is global;
//! collaborators receive handles from the bootstrap.

use std::time::Duration;

use stagehand_core::ThreadAffinity;
use stagehand_host::{HostScheduler, SceneWorld};
use stagehand_loader::{SceneBackends, SceneTransitionEngine};

use crate::boot_config::BootConfig;
use crate::controller::SceneController;

/// Owner of the running demo
pub struct Bootstrap {
    scheduler: HostScheduler,
    engine: SceneTransitionEngine,
    controller: SceneController,
    frame_time: Duration,
    max_frames: u32,
}

impl Bootstrap {
    /// Build everything; the calling thread becomes the control thread
    pub fn new(config: &BootConfig) -> Self {
        let affinity = ThreadAffinity::capture();
        let mut scheduler = HostScheduler::new();

        let backends = SceneBackends::new(SceneWorld::new());
        backends.attach(&mut scheduler);
        for (key, profile) in &config.scenes {
            backends.scene_manager.register(key.clone(), profile.clone());
            backends.addressables.register(key.clone(), profile.clone());
        }
        log::info!("Registered {} scene(s)", config.scenes.len());

        let engine = SceneTransitionEngine::new(affinity, &scheduler, backends, &config.loader);
        let controller = SceneController::new(engine.clone(), config.demo.clone());

        Self {
            scheduler,
            engine,
            controller,
            frame_time: config.demo.frame_time(),
            max_frames: config.demo.max_frames,
        }
    }

    /// Run one host frame
    pub fn frame(&mut self) {
        self.scheduler.tick(self.frame_time);
        self.controller.update(self.frame_time);
    }

    /// Run frames until the engine and scheduler are idle; returns frames run
    pub fn run_until_idle(&mut self) -> u32 {
        let mut frames = 0;
        while frames < self.max_frames
            && (self.engine.is_processing() || !self.scheduler.is_idle())
        {
            self.frame();
            frames += 1;
        }
        if frames == self.max_frames {
            log::warn!("Still busy after {} frames", frames);
        }
        frames
    }

    /// Frame cap per demo step
    pub fn max_frames(&self) -> u32 {
        self.max_frames
    }

    pub fn controller(&self) -> &SceneController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SceneController {
        &mut self.controller
    }

    pub fn engine(&self) -> &SceneTransitionEngine {
        &self.engine
    }

    /// Scenes currently loaded, by name
    pub fn loaded_scene_names(&self) -> Vec<String> {
        self.engine
            .backends()
            .world()
            .loaded_scenes()
            .into_iter()
            .map(|scene| scene.name)
            .collect()
    }

    /// Current simulated time
    pub fn time(&self) -> Duration {
        self.scheduler.clock().time()
    }
}
