//! Integration tests for stagehand_loader
//!
//! The engine runs against the simulated backends on a fixed 100 ms frame, so
//! every schedule below is deterministic.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use stagehand_core::{HostError, LoadSceneMode, StagehandError, ThreadAffinity};
use stagehand_host::{HostScheduler, LoadProfile, Scene, SceneInstance, SceneWorld};
use stagehand_loader::*;

const FRAME: Duration = Duration::from_millis(100);

struct Fixture {
    scheduler: HostScheduler,
    engine: SceneTransitionEngine,
    backends: SceneBackends,
}

impl Fixture {
    fn new(config: LoaderConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut scheduler = HostScheduler::new();
        let backends = SceneBackends::new(SceneWorld::new());
        backends.attach(&mut scheduler);
        backends
            .scene_manager
            .register("Level1", LoadProfile::new(3, 2));
        backends
            .scene_manager
            .register("Instant", LoadProfile::new(0, 0));
        backends
            .addressables
            .register("levels/additive", LoadProfile::new(2, 1));

        let engine = SceneTransitionEngine::new(
            ThreadAffinity::capture(),
            &scheduler,
            backends.clone(),
            &config,
        );
        Self {
            scheduler,
            engine,
            backends,
        }
    }

    fn run(&mut self) -> usize {
        self.scheduler.run_until_idle(FRAME, 200)
    }

    fn tick(&mut self, frames: usize) {
        for _ in 0..frames {
            self.scheduler.tick(FRAME);
        }
    }

    fn kinds(&self) -> Vec<TransitionEventKind> {
        self.engine
            .drain_events()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }
}

/// Callback that records every value it is handed
fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, LoadCallback<T>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, Box::new(move |value| sink.lock().push(value)))
}

fn counter() -> (Arc<Mutex<u32>>, UnloadCallback) {
    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    (count, Box::new(move || *sink.lock() += 1))
}

fn position(kinds: &[TransitionEventKind], kind: TransitionEventKind) -> usize {
    kinds
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_else(|| panic!("{:?} missing from {:?}", kind, kinds))
}

/// INVARIANT: is_processing covers exactly the span from acceptance to the terminal state
#[test]
fn invariant_processing_spans_whole_operation() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let (scenes, callback) = recorder::<Scene>();

    fx.engine
        .load_scene("Level1", LoadSceneMode::Single, Some(callback))
        .unwrap();

    let mut history = vec![fx.engine.is_processing()];
    for _ in 0..20 {
        fx.tick(1);
        history.push(fx.engine.is_processing());
    }

    let falls = history.windows(2).filter(|w| w[0] && !w[1]).count();
    let rises = history.windows(2).filter(|w| !w[0] && w[1]).count();
    assert!(history[0]);
    assert_eq!(falls, 1);
    assert_eq!(rises, 0);

    let scenes = scenes.lock();
    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].name(), "Level1");
}

/// INVARIANT: A second call while busy is rejected and leaves the in-flight operation alone
#[test]
fn invariant_second_call_rejected_without_mutation() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let first = fx
        .engine
        .load_scene("Level1", LoadSceneMode::Single, None)
        .unwrap();
    let before = fx.engine.current_operation();

    let err = fx
        .engine
        .load_scene_addressable("levels/additive", LoadSceneMode::Additive, None)
        .unwrap_err();

    assert_eq!(
        err,
        StagehandError::Busy {
            operation: "load_scene_addressable"
        }
    );
    assert!(err.is_misuse());
    assert_eq!(fx.engine.current_operation(), before);
    assert_eq!(fx.kinds(), vec![TransitionEventKind::Accepted]);

    fx.run();
    assert_eq!(fx.engine.last_outcome(), Some((first, Outcome::Completed)));
}

/// INVARIANT: Calls from another thread fail before touching any state
#[test]
fn invariant_off_thread_call_rejected() {
    let fx = Fixture::new(LoaderConfig::default());
    let engine = fx.engine.clone();

    let result = std::thread::spawn(move || {
        (
            engine.load_scene("Level1", LoadSceneMode::Single, None),
            engine.cancel(),
        )
    })
    .join()
    .unwrap();

    assert_eq!(
        result.0,
        Err(StagehandError::NotControlThread {
            operation: "load_scene"
        })
    );
    assert_eq!(
        result.1,
        Err(StagehandError::NotControlThread { operation: "cancel" })
    );
    assert!(!fx.engine.is_processing());
    assert!(fx.kinds().is_empty());
}

/// INVARIANT: Cancelling before phase one is ready never runs the callback
#[test]
fn invariant_cancel_before_staged_skips_callback() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let (scenes, callback) = recorder::<Scene>();

    let id = fx
        .engine
        .load_scene("Level1", LoadSceneMode::Single, Some(callback))
        .unwrap();
    fx.tick(3);
    assert_eq!(fx.engine.cancel(), Ok(true));
    assert!(fx.engine.is_processing());

    fx.run();

    assert!(scenes.lock().is_empty());
    assert!(!fx.engine.is_processing());
    assert_eq!(fx.engine.last_outcome(), Some((id, Outcome::Cancelled)));

    let kinds = fx.kinds();
    assert!(kinds.contains(&TransitionEventKind::Requested));
    assert!(!kinds.contains(&TransitionEventKind::Committed));
    assert_eq!(kinds.last(), Some(&TransitionEventKind::Cancelled));
}

#[test]
fn test_cancel_right_after_accept_has_no_side_effects() {
    let mut fx = Fixture::new(LoaderConfig::default());

    fx.engine
        .load_scene("Level1", LoadSceneMode::Single, None)
        .unwrap();
    fx.engine.cancel().unwrap();
    fx.run();

    assert_eq!(
        fx.kinds(),
        vec![TransitionEventKind::Accepted, TransitionEventKind::Cancelled]
    );
    assert_eq!(fx.backends.scene_manager.pending_operations(), 0);
}

/// INVARIANT: Debug delay holds phase one for at least that much frame time
#[test]
fn invariant_debug_delay_is_minimum_latency() {
    let mut fx = Fixture::new(LoaderConfig::default().with_debug_delay(1000));

    fx.engine
        .load_scene("Instant", LoadSceneMode::Single, None)
        .unwrap();

    let mut requested_at = None;
    let mut staged_at = None;
    for _ in 0..40 {
        fx.tick(1);
        let now = fx.scheduler.clock().time();
        for kind in fx.kinds() {
            match kind {
                TransitionEventKind::Requested => requested_at = Some(now),
                TransitionEventKind::Staged => staged_at = Some(now),
                _ => {}
            }
        }
    }

    let requested_at = requested_at.expect("request never issued");
    let staged_at = staged_at.expect("phase one never finished");
    assert!(staged_at - requested_at >= Duration::from_millis(1000));
    assert!(!fx.engine.is_processing());
}

/// INVARIANT: Staged < Committed < Activated < callback
#[test]
fn invariant_event_order() {
    let mut fx = Fixture::new(LoaderConfig::default().with_yield_logging(true));
    let seen_at_callback = Arc::new(Mutex::new(Vec::new()));

    let engine = fx.engine.clone();
    let sink = seen_at_callback.clone();
    fx.engine
        .load_scene(
            "Level1",
            LoadSceneMode::Single,
            Some(Box::new(move |_| {
                let kinds = engine.drain_events().into_iter().map(|e| e.kind);
                sink.lock().extend(kinds);
            })),
        )
        .unwrap();
    fx.run();

    let kinds = seen_at_callback.lock().clone();
    let staged = position(&kinds, TransitionEventKind::Staged);
    let committed = position(&kinds, TransitionEventKind::Committed);
    let activated = position(&kinds, TransitionEventKind::Activated);
    assert!(staged < committed);
    assert!(committed < activated);
}

#[test]
fn test_level1_scenario() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let processing_in_callback = Arc::new(Mutex::new(None));

    let engine = fx.engine.clone();
    let probe = processing_in_callback.clone();
    fx.engine
        .load_scene(
            "Level1",
            LoadSceneMode::Single,
            Some(Box::new(move |scene| {
                assert_eq!(scene.name(), "Level1");
                *probe.lock() = Some(engine.is_processing());
            })),
        )
        .unwrap();
    fx.run();

    // The slot is held until the callback returns.
    assert_eq!(*processing_in_callback.lock(), Some(true));
    assert!(!fx.engine.is_processing());
    let scene = fx.backends.scene_manager.get_scene_by_name("Level1").unwrap();
    assert!(fx.backends.world().is_loaded(&scene));
}

#[test]
fn test_unload_cancelled_mid_phase_one() {
    let mut fx = Fixture::new(LoaderConfig::default());
    fx.engine
        .load_scene("Level1", LoadSceneMode::Single, None)
        .unwrap();
    fx.run();
    let scene = fx.backends.scene_manager.get_scene_by_name("Level1").unwrap();

    let (calls, callback) = counter();
    let id = fx.engine.unload_scene(&scene, Some(callback)).unwrap();
    fx.tick(3);
    fx.engine.cancel().unwrap();
    fx.run();

    assert_eq!(*calls.lock(), 0);
    assert!(!fx.engine.is_processing());
    assert_eq!(fx.engine.last_outcome(), Some((id, Outcome::Cancelled)));
    assert!(fx.backends.world().is_loaded(&scene));
}

#[test]
fn test_scene_manager_unload() {
    let mut fx = Fixture::new(LoaderConfig::default());
    fx.engine
        .load_scene("Instant", LoadSceneMode::Single, None)
        .unwrap();
    fx.run();
    let scene = fx.backends.scene_manager.get_scene_by_name("Instant").unwrap();

    let (calls, callback) = counter();
    fx.engine.unload_scene(&scene, Some(callback)).unwrap();
    fx.run();

    assert_eq!(*calls.lock(), 1);
    assert!(!fx.backends.world().is_loaded(&scene));
}

#[test]
fn test_addressable_load_and_unload() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let (instances, callback) = recorder::<SceneInstance>();

    fx.engine
        .load_scene_addressable("levels/additive", LoadSceneMode::Additive, Some(callback))
        .unwrap();
    fx.run();

    let instance = instances.lock().pop().expect("load callback never ran");
    assert!(fx.backends.world().is_loaded(instance.scene()));
    let kinds = fx.kinds();
    assert!(position(&kinds, TransitionEventKind::Committed) < position(&kinds, TransitionEventKind::Activated));

    let (calls, callback) = counter();
    fx.engine
        .unload_scene_addressable(&instance, Some(callback))
        .unwrap();
    fx.run();

    assert_eq!(*calls.lock(), 1);
    assert!(!fx.backends.world().is_loaded(instance.scene()));
    assert_eq!(fx.backends.addressables.pending_operations(), 0);
}

#[test]
fn test_backend_fault_fails_and_releases() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let (scenes, callback) = recorder::<Scene>();

    let id = fx
        .engine
        .load_scene("Missing", LoadSceneMode::Single, Some(callback))
        .unwrap();
    fx.run();

    let expected = HostError::SceneNotFound("Missing".into()).to_string();
    assert_eq!(fx.engine.last_outcome(), Some((id, Outcome::Failed(expected))));
    assert!(scenes.lock().is_empty());
    assert!(!fx.engine.is_processing());

    // The slot is usable again.
    fx.engine
        .load_scene("Instant", LoadSceneMode::Single, None)
        .unwrap();
}

/// INVARIANT: A call made from inside the completion callback is still rejected as busy
#[test]
fn invariant_callback_runs_inside_operation() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let chained = Arc::new(Mutex::new(None));

    let engine = fx.engine.clone();
    let slot = chained.clone();
    let first = fx
        .engine
        .load_scene(
            "Instant",
            LoadSceneMode::Single,
            Some(Box::new(move |_| {
                *slot.lock() = Some(engine.load_scene_addressable(
                    "levels/additive",
                    LoadSceneMode::Additive,
                    None,
                ));
            })),
        )
        .unwrap();
    fx.run();

    assert_eq!(
        chained.lock().clone(),
        Some(Err(StagehandError::Busy {
            operation: "load_scene_addressable"
        }))
    );
    assert_eq!(fx.engine.last_outcome(), Some((first, Outcome::Completed)));
    assert_eq!(fx.backends.world().loaded_scenes().len(), 1);

    // Free again once the callback has returned.
    fx.engine
        .load_scene_addressable("levels/additive", LoadSceneMode::Additive, None)
        .unwrap();
    fx.run();
    assert_eq!(fx.backends.world().loaded_scenes().len(), 2);
}

#[test]
fn test_panicking_callback_still_releases() {
    let mut fx = Fixture::new(LoaderConfig::default());

    let id = fx
        .engine
        .load_scene(
            "Instant",
            LoadSceneMode::Single,
            Some(Box::new(|_| panic!("callback blew up"))),
        )
        .unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fx.run()));

    assert!(result.is_err());
    assert!(!fx.engine.is_processing());
    assert!(matches!(
        fx.engine.last_outcome(),
        Some((last, Outcome::Failed(_))) if last == id
    ));
}

/// INVARIANT: Cancelling during activation polling ends as cancelled without a callback
#[test]
fn invariant_cancel_during_activation_skips_callback() {
    let mut fx = Fixture::new(LoaderConfig::default());
    let (scenes, callback) = recorder::<Scene>();

    let id = fx
        .engine
        .load_scene("Level1", LoadSceneMode::Single, Some(callback))
        .unwrap();

    let mut committed = false;
    for _ in 0..20 {
        fx.tick(1);
        if fx.kinds().contains(&TransitionEventKind::Committed) {
            committed = true;
            break;
        }
    }
    assert!(committed);
    assert_eq!(fx.engine.cancel(), Ok(true));

    fx.run();

    assert!(scenes.lock().is_empty());
    assert!(!fx.engine.is_processing());
    assert_eq!(fx.engine.last_outcome(), Some((id, Outcome::Cancelled)));

    let kinds = fx.kinds();
    assert!(!kinds.contains(&TransitionEventKind::Activated));
    assert_eq!(kinds.last(), Some(&TransitionEventKind::Cancelled));
}

#[test]
fn test_worker_hand_off_runs_on_control_thread() {
    let mut fx = Fixture::new(LoaderConfig::default().with_handoff(HandOff::Worker));
    let control = std::thread::current().id();
    let ran_on = Arc::new(Mutex::new(None));

    let probe = ran_on.clone();
    fx.engine
        .load_scene(
            "Instant",
            LoadSceneMode::Single,
            Some(Box::new(move |_| {
                *probe.lock() = Some(std::thread::current().id());
            })),
        )
        .unwrap();

    // The worker posts asynchronously; keep ticking until it lands.
    for _ in 0..500 {
        if ran_on.lock().is_some() {
            break;
        }
        fx.tick(1);
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(*ran_on.lock(), Some(control));
    assert!(!fx.engine.is_processing());
}

#[test]
fn test_closed_scheduler_rejects_and_releases() {
    let fx = Fixture::new(LoaderConfig::default());
    let Fixture {
        scheduler, engine, ..
    } = fx;
    drop(scheduler);

    let err = engine
        .load_scene("Level1", LoadSceneMode::Single, None)
        .unwrap_err();
    assert_eq!(err, StagehandError::Host(HostError::SchedulerClosed));
    assert!(!engine.is_processing());
}
