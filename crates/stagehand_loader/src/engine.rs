//! Single-flight scene transition engine
//!
//! The engine owns at most one in-flight operation. Entry points validate
//! thread affinity and the single-flight slot synchronously, then hand the
//! operation body to the control context; the body runs as a local task on
//! the host scheduler and reports through the completion callback.

use parking_lot::Mutex;
use std::sync::Arc;

use stagehand_core::{
    HostError, LoadSceneMode, OperationId, OperationIdGenerator, Result, StagehandError,
    ThreadAffinity,
};
use stagehand_host::{
    AddressablesHost, CancellationToken, ControlContext, FrameClock, HostScheduler, LocalSpawner,
    Scene, SceneInstance, SceneManagerHost, SceneWorld,
};

use crate::backend::{
    AddressableLoad, AddressableUnload, BackendKind, SceneManagerLoad, SceneManagerUnload,
    TwoPhaseOperation,
};
use crate::config::{DebugOptions, HandOff, LoaderConfig};
use crate::event::{Outcome, TransitionEvent, TransitionEventKind};
use crate::machine::{drive, Interrupt, PollContext};

/// Completion callback for loads, invoked on the control thread
pub type LoadCallback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Completion callback for unloads, invoked on the control thread
pub type UnloadCallback = Box<dyn FnOnce() + Send + 'static>;

/// The two host backends the engine can drive
#[derive(Clone)]
pub struct SceneBackends {
    /// Progress-based backend
    pub scene_manager: Arc<SceneManagerHost>,
    /// Address-keyed backend
    pub addressables: Arc<AddressablesHost>,
}

impl SceneBackends {
    /// Build both backends over one shared world
    pub fn new(world: SceneWorld) -> Self {
        Self {
            scene_manager: Arc::new(SceneManagerHost::new(world.clone())),
            addressables: Arc::new(AddressablesHost::new(world)),
        }
    }

    /// Register both backends to be advanced by `scheduler`
    pub fn attach(&self, scheduler: &mut HostScheduler) {
        scheduler.add_system(self.scene_manager.clone());
        scheduler.add_system(self.addressables.clone());
    }

    /// The world both backends load into
    pub fn world(&self) -> &SceneWorld {
        self.scene_manager.world()
    }
}

/// What is currently in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    /// Operation id
    pub id: OperationId,
    /// Entry point that accepted it
    pub operation: &'static str,
    /// Backend it runs against
    pub backend: BackendKind,
    /// Scene name or address
    pub target: String,
}

struct InFlight {
    summary: OperationSummary,
    token: CancellationToken,
}

struct EngineInner {
    affinity: ThreadAffinity,
    control: ControlContext,
    clock: FrameClock,
    backends: SceneBackends,
    handoff: HandOff,
    ids: OperationIdGenerator,
    in_flight: Mutex<Option<InFlight>>,
    debug: DebugOptions,
    events: Mutex<Vec<TransitionEvent>>,
    last_outcome: Mutex<Option<(OperationId, Outcome)>>,
}

impl EngineInner {
    fn emit(&self, id: OperationId, kind: TransitionEventKind) {
        self.events.lock().push(TransitionEvent::new(id, kind));
    }

    /// Check the slot still belongs to `id` when its body starts
    ///
    /// A different occupant is cancelled and evicted; neither runs.
    fn claim(&self, id: OperationId) -> bool {
        let mut slot = self.in_flight.lock();
        match slot.as_ref() {
            Some(current) if current.summary.id == id => true,
            Some(current) => {
                log::warn!(
                    "{} found {} in flight when starting, resetting",
                    id,
                    current.summary.id
                );
                current.token.cancel();
                *slot = None;
                false
            }
            None => {
                log::warn!("{} was released before it started", id);
                false
            }
        }
    }

    /// Record the terminal state and release the slot if `id` still holds it
    fn settle(&self, id: OperationId, outcome: Outcome) {
        {
            let mut slot = self.in_flight.lock();
            if slot.as_ref().map_or(false, |f| f.summary.id == id) {
                *slot = None;
            }
        }

        let kind = match &outcome {
            Outcome::Completed => TransitionEventKind::Completed,
            Outcome::Cancelled => TransitionEventKind::Cancelled,
            Outcome::Failed(message) => TransitionEventKind::Failed(message.clone()),
        };
        self.emit(id, kind);
        *self.last_outcome.lock() = Some((id, outcome));
    }

    async fn run<Op, F>(
        self: Arc<Self>,
        id: OperationId,
        label: &'static str,
        token: CancellationToken,
        op: Op,
        on_complete: F,
    ) where
        Op: TwoPhaseOperation,
        F: FnOnce(Op::Output),
    {
        if !self.claim(id) {
            self.settle(id, Outcome::Cancelled);
            return;
        }

        let ctx = PollContext {
            operation: id,
            label,
            token: &token,
            clock: &self.clock,
            debug: &self.debug,
            events: &self.events,
        };

        match drive(op, &ctx).await {
            Ok(output) => {
                log::info!("{} {} completed", label, id);
                let release = Release::new(&self, id);
                on_complete(output);
                release.finish(Outcome::Completed);
            }
            Err(Interrupt::Cancelled) => {
                log::info!("{} {} cancelled", label, id);
                self.settle(id, Outcome::Cancelled);
            }
            Err(Interrupt::Failed(e)) => {
                log::error!("{} {} failed: {}", label, id, e);
                self.settle(id, Outcome::Failed(e.to_string()));
            }
        }
    }
}

/// Settles an operation when dropped, so a panicking callback still releases
/// the slot
struct Release<'a> {
    inner: &'a EngineInner,
    id: OperationId,
    outcome: Option<Outcome>,
}

impl<'a> Release<'a> {
    fn new(inner: &'a EngineInner, id: OperationId) -> Self {
        Self {
            inner,
            id,
            outcome: None,
        }
    }

    fn finish(mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            log::error!("{} completion callback panicked", self.id);
            Outcome::Failed("completion callback panicked".to_string())
        });
        self.inner.settle(self.id, outcome);
    }
}

/// Coordinates scene loads and unloads, one at a time, on the control thread
///
/// Cheap to clone; clones share the same in-flight slot. The engine is `Send`
/// and `Sync` so that misuse from another thread is rejected at runtime
/// rather than being impossible to express.
#[derive(Clone)]
pub struct SceneTransitionEngine {
    inner: Arc<EngineInner>,
}

impl SceneTransitionEngine {
    /// Create an engine bound to `scheduler`'s control context
    pub fn new(
        affinity: ThreadAffinity,
        scheduler: &HostScheduler,
        backends: SceneBackends,
        config: &LoaderConfig,
    ) -> Self {
        log::info!(
            "Scene transition engine ready (hand-off: {}, debug delay: {} ms)",
            config.handoff,
            config.debug_delay_ms
        );
        Self {
            inner: Arc::new(EngineInner {
                affinity,
                control: scheduler.control_context(),
                clock: scheduler.clock().clone(),
                backends,
                handoff: config.handoff,
                ids: OperationIdGenerator::new(),
                in_flight: Mutex::new(None),
                debug: DebugOptions::new(config),
                events: Mutex::new(Vec::new()),
                last_outcome: Mutex::new(None),
            }),
        }
    }

    /// Load a scene by name through the scene-manager backend
    pub fn load_scene(
        &self,
        name: impl Into<String>,
        mode: LoadSceneMode,
        on_complete: Option<LoadCallback<Scene>>,
    ) -> Result<OperationId> {
        let name = name.into();
        let op = SceneManagerLoad::new(self.inner.backends.scene_manager.clone(), name.clone(), mode);
        self.accept("load_scene", name, op, move |scene: Scene| {
            if let Some(callback) = on_complete {
                callback(scene);
            }
        })
    }

    /// Load a scene by address through the addressables backend
    pub fn load_scene_addressable(
        &self,
        address: impl Into<String>,
        mode: LoadSceneMode,
        on_complete: Option<LoadCallback<SceneInstance>>,
    ) -> Result<OperationId> {
        let address = address.into();
        let op =
            AddressableLoad::new(self.inner.backends.addressables.clone(), address.clone(), mode);
        self.accept("load_scene_addressable", address, op, move |instance: SceneInstance| {
            if let Some(callback) = on_complete {
                callback(instance);
            }
        })
    }

    /// Unload a scene through the scene-manager backend
    pub fn unload_scene(
        &self,
        scene: &Scene,
        on_complete: Option<UnloadCallback>,
    ) -> Result<OperationId> {
        let op = SceneManagerUnload::new(self.inner.backends.scene_manager.clone(), scene.clone());
        self.accept("unload_scene", scene.name.clone(), op, unload_callback(on_complete))
    }

    /// Unload an addressable scene instance
    pub fn unload_scene_addressable(
        &self,
        instance: &SceneInstance,
        on_complete: Option<UnloadCallback>,
    ) -> Result<OperationId> {
        let op = AddressableUnload::new(self.inner.backends.addressables.clone(), instance.clone());
        self.accept(
            "unload_scene_addressable",
            instance.scene().name.clone(),
            op,
            unload_callback(on_complete),
        )
    }

    fn accept<Op, F>(
        &self,
        operation: &'static str,
        target: String,
        op: Op,
        on_complete: F,
    ) -> Result<OperationId>
    where
        Op: TwoPhaseOperation + Send + 'static,
        F: FnOnce(Op::Output) + Send + 'static,
    {
        self.inner.affinity.ensure(operation)?;

        let (id, token) = {
            let mut slot = self.inner.in_flight.lock();
            if let Some(current) = slot.as_ref() {
                log::error!(
                    "{} rejected: {} ({}) is still in flight",
                    operation,
                    current.summary.id,
                    current.summary.operation
                );
                return Err(StagehandError::Busy { operation });
            }

            let id = self.inner.ids.next();
            let token = CancellationToken::new();
            *slot = Some(InFlight {
                summary: OperationSummary {
                    id,
                    operation,
                    backend: op.backend(),
                    target: target.clone(),
                },
                token: token.clone(),
            });
            (id, token)
        };

        self.inner.emit(id, TransitionEventKind::Accepted);
        log::info!("{} {} accepted: '{}'", operation, id, target);

        let inner = Arc::clone(&self.inner);
        let job = move |spawner: &LocalSpawner| {
            spawner.spawn_local(inner.run(id, operation, token, op, on_complete));
        };

        if let Err(e) = self.hand_off(id, job) {
            log::error!("{} {} could not be handed off: {}", operation, id, e);
            self.inner.settle(id, Outcome::Failed(e.to_string()));
            return Err(e.into());
        }
        Ok(id)
    }

    fn hand_off<J>(&self, id: OperationId, job: J) -> std::result::Result<(), HostError>
    where
        J: FnOnce(&LocalSpawner) + Send + 'static,
    {
        match self.inner.handoff {
            HandOff::Direct => self.inner.control.post(job),
            HandOff::Worker => {
                let inner = Arc::clone(&self.inner);
                std::thread::Builder::new()
                    .name("stagehand-handoff".into())
                    .spawn(move || {
                        if let Err(e) = inner.control.post(job) {
                            log::error!("{} could not be posted back: {}", id, e);
                            inner.settle(id, Outcome::Failed(e.to_string()));
                        }
                    })
                    .map(|_| ())
                    .map_err(|e| HostError::HandOff(e.to_string()))
            }
        }
    }

    /// Request cancellation of the in-flight operation
    ///
    /// Returns false if nothing is in flight or it was already cancelled. The
    /// slot is released when the running operation observes the request.
    pub fn cancel(&self) -> Result<bool> {
        self.inner.affinity.ensure("cancel")?;

        let slot = self.inner.in_flight.lock();
        match slot.as_ref() {
            Some(current) if !current.token.is_cancelled() => {
                log::info!("Cancelling {} ({})", current.summary.id, current.summary.operation);
                current.token.cancel();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Check if an operation is in flight
    pub fn is_processing(&self) -> bool {
        self.inner.affinity.assert_control_thread("is_processing");
        self.inner.in_flight.lock().is_some()
    }

    /// The in-flight operation, if any
    pub fn current_operation(&self) -> Option<OperationSummary> {
        self.inner
            .in_flight
            .lock()
            .as_ref()
            .map(|f| f.summary.clone())
    }

    /// Minimum phase-one latency in milliseconds (0 = off)
    pub fn debug_delay(&self) -> u32 {
        self.inner.affinity.assert_control_thread("debug_delay");
        self.inner.debug.delay_ms()
    }

    pub fn set_debug_delay(&self, millis: u32) {
        self.inner.affinity.assert_control_thread("set_debug_delay");
        log::debug!("Debug delay set to {} ms", millis);
        self.inner.debug.set_delay_ms(millis);
    }

    pub fn debug_yield_logging(&self) -> bool {
        self.inner.affinity.assert_control_thread("debug_yield_logging");
        self.inner.debug.yield_logging()
    }

    pub fn set_debug_yield_logging(&self, enabled: bool) {
        self.inner.affinity.assert_control_thread("set_debug_yield_logging");
        self.inner.debug.set_yield_logging(enabled);
    }

    /// Terminal state of the most recently finished operation
    pub fn last_outcome(&self) -> Option<(OperationId, Outcome)> {
        self.inner.last_outcome.lock().clone()
    }

    /// Take all events recorded since the previous drain
    pub fn drain_events(&self) -> Vec<TransitionEvent> {
        std::mem::take(&mut *self.inner.events.lock())
    }

    /// Backends this engine drives
    pub fn backends(&self) -> &SceneBackends {
        &self.inner.backends
    }
}

impl std::fmt::Debug for SceneTransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTransitionEngine")
            .field("in_flight", &self.current_operation())
            .field("handoff", &self.inner.handoff)
            .finish()
    }
}

fn unload_callback(on_complete: Option<UnloadCallback>) -> impl FnOnce(()) + Send + 'static {
    move |()| {
        if let Some(callback) = on_complete {
            callback();
        }
    }
}
