//! Stagehand demo runtime
//!
//! Boots the scene transition engine on the main thread against the simulated
//! host and plays the controller's three flows in order: change scene, load
//! an additive scene, unload it again.
//!
//! Run with: cargo run -p stagehand_app
//!       or: STAGEHAND_LOADER=addressables cargo run --bin stagehand

mod boot_config;
mod bootstrap;
mod controller;
mod indicator;
mod trim;

use boot_config::BootConfig;
use bootstrap::Bootstrap;
use controller::{ControllerError, SceneController};

use stagehand_core::OperationId;

type Step = fn(&mut SceneController) -> Result<OperationId, ControllerError>;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BootConfig::load();
    config.log_summary();

    let mut app = Bootstrap::new(&config);

    let steps: [(&str, Step); 3] = [
        ("change scene", SceneController::change_scene),
        ("load additive", SceneController::load_additive),
        ("unload additive", SceneController::unload_additive),
    ];

    for (name, step) in steps {
        if let Err(e) = run_step(&mut app, name, step) {
            log::error!("{} failed: {}", name, e);
            std::process::exit(1);
        }
    }

    log::info!(
        "Demo finished at {:?} simulated time with {:?} loaded",
        app.time(),
        app.loaded_scene_names()
    );
}

/// Start one flow and run frames until it settles
fn run_step(app: &mut Bootstrap, name: &str, step: Step) -> Result<(), ControllerError> {
    let id = step(app.controller_mut())?;
    log::info!("{} started as {}", name, id);

    let mut shown = String::new();
    let mut frames = 0;
    while app.engine().is_processing() && frames < app.max_frames() {
        app.frame();
        frames += 1;

        let indicator = app.controller().indicator();
        if indicator.is_active() && indicator.text() != shown {
            shown = indicator.text();
            log::info!("{}", shown);
        }
    }
    frames += app.run_until_idle();

    match app.engine().last_outcome() {
        Some((last, outcome)) if last == id => {
            log::info!("{} settled after {} frame(s): {:?}", name, frames, outcome);
        }
        _ => log::warn!("{} did not settle after {} frame(s)", name, frames),
    }
    log::info!("Loaded scenes: {:?}", app.loaded_scene_names());
    if let Some(additive) = app.controller().additive_scene() {
        log::info!("Additive scene held: '{}'", additive.scene().name());
    }
    Ok(())
}
