//! Single-threaded cooperative scheduler
//!
//! One call to [`HostScheduler::tick`] is one host frame:
//! 1. advance the [`FrameClock`]
//! 2. run jobs posted through a [`ControlContext`] (possibly from other threads)
//! 3. update every registered [`HostSystem`]
//! 4. poll each task that was woken since the previous tick, once
//!
//! A task that wakes itself while being polled (see [`yield_now`]) is polled
//! again on the next tick, never twice in the same one.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::task::{waker, ArcWake};
use parking_lot::Mutex;
use stagehand_core::HostError;

use crate::clock::FrameClock;

/// Host subsystem advanced once per tick, before tasks resume
pub trait HostSystem {
    /// Advance internal state by one frame
    fn update(&self);
}

type Job = Box<dyn FnOnce(&LocalSpawner) + Send + 'static>;

/// Spawns non-`Send` tasks onto the control thread's scheduler
///
/// Only reachable on the control thread: from the scheduler itself or from
/// inside a posted job.
#[derive(Clone, Default)]
pub struct LocalSpawner {
    queue: Rc<RefCell<VecDeque<LocalBoxFuture<'static, ()>>>>,
}

impl LocalSpawner {
    /// Queue a task; it is first polled on the next tick
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.queue.borrow_mut().push_back(future.boxed_local());
    }

    fn take_all(&self) -> Vec<LocalBoxFuture<'static, ()>> {
        self.queue.borrow_mut().drain(..).collect()
    }

    fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// Handle for posting work onto the control thread from anywhere
#[derive(Clone)]
pub struct ControlContext {
    tx: Sender<Job>,
}

impl ControlContext {
    /// Run `job` on the control thread at the start of the next tick
    pub fn post<F>(&self, job: F) -> Result<(), HostError>
    where
        F: FnOnce(&LocalSpawner) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| HostError::SchedulerClosed)
    }
}

impl std::fmt::Debug for ControlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlContext")
            .field("pending", &self.tx.len())
            .finish()
    }
}

type TaskId = u64;

struct TaskWaker {
    id: TaskId,
    woken: Arc<Mutex<BTreeSet<TaskId>>>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.lock().insert(arc_self.id);
    }
}

/// The host's cooperative executor
pub struct HostScheduler {
    clock: FrameClock,
    tasks: BTreeMap<TaskId, LocalBoxFuture<'static, ()>>,
    next_task: TaskId,
    woken: Arc<Mutex<BTreeSet<TaskId>>>,
    spawner: LocalSpawner,
    inbox_tx: Sender<Job>,
    inbox_rx: Receiver<Job>,
    systems: Vec<Arc<dyn HostSystem>>,
}

impl HostScheduler {
    /// Create a scheduler with a fresh clock
    pub fn new() -> Self {
        Self::with_clock(FrameClock::new())
    }

    /// Create a scheduler driving an existing clock
    pub fn with_clock(clock: FrameClock) -> Self {
        let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded();
        Self {
            clock,
            tasks: BTreeMap::new(),
            next_task: 0,
            woken: Arc::new(Mutex::new(BTreeSet::new())),
            spawner: LocalSpawner::default(),
            inbox_tx,
            inbox_rx,
            systems: Vec::new(),
        }
    }

    /// The clock this scheduler advances
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Current frame number
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Context for posting work back onto this scheduler's thread
    pub fn control_context(&self) -> ControlContext {
        ControlContext {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Register a subsystem updated every tick
    pub fn add_system(&mut self, system: Arc<dyn HostSystem>) {
        self.systems.push(system);
    }

    /// Queue a task; it is first polled on the next tick
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn_local(future);
    }

    /// Number of live tasks, including ones not yet polled
    pub fn task_count(&self) -> usize {
        self.tasks.len() + self.spawner.queue.borrow().len()
    }

    /// No tasks alive and nothing posted
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.spawner.is_empty() && self.inbox_rx.is_empty()
    }

    /// Run one host frame
    pub fn tick(&mut self, delta_time: Duration) {
        let timing = self.clock.advance(delta_time);

        while let Ok(job) = self.inbox_rx.try_recv() {
            job(&self.spawner);
        }

        for system in &self.systems {
            system.update();
        }

        for task in self.spawner.take_all() {
            let id = self.next_task;
            self.next_task += 1;
            self.tasks.insert(id, task);
            self.woken.lock().insert(id);
        }

        let ready: Vec<TaskId> = std::mem::take(&mut *self.woken.lock()).into_iter().collect();
        for id in ready {
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            let task_waker = waker(Arc::new(TaskWaker {
                id,
                woken: Arc::clone(&self.woken),
            }));
            let mut cx = Context::from_waker(&task_waker);
            if task.as_mut().poll(&mut cx).is_ready() {
                self.tasks.remove(&id);
            }
        }

        log::trace!("Frame {} done, {} task(s) alive", timing.frame, self.task_count());
    }

    /// Tick until idle or `max_ticks` frames have run; returns frames run
    pub fn run_until_idle(&mut self, delta_time: Duration, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while !self.is_idle() && ticks < max_ticks {
            self.tick(delta_time);
            ticks += 1;
        }
        ticks
    }
}

impl Default for HostScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Suspend the current task until the next tick
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`]
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_spawned_task_starts_next_tick() {
        let mut scheduler = HostScheduler::new();
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        scheduler.spawn_local(async move { flag.set(true) });
        assert!(!ran.get());
        assert_eq!(scheduler.task_count(), 1);

        scheduler.tick(FRAME);
        assert!(ran.get());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_yield_resumes_on_next_tick() {
        let mut scheduler = HostScheduler::new();
        let clock = scheduler.clock().clone();
        let frames = Rc::new(RefCell::new(Vec::new()));

        let seen = frames.clone();
        scheduler.spawn_local(async move {
            for _ in 0..3 {
                seen.borrow_mut().push(clock.frame());
                yield_now().await;
            }
        });

        let ticks = scheduler.run_until_idle(FRAME, 10);

        assert_eq!(*frames.borrow(), vec![1, 2, 3]);
        assert_eq!(ticks, 4);
    }

    #[test]
    fn test_posted_job_runs_on_scheduler_thread() {
        let mut scheduler = HostScheduler::new();
        let ctx = scheduler.control_context();
        let control = std::thread::current().id();
        let observed = Arc::new(Mutex::new(None));

        let slot = observed.clone();
        std::thread::spawn(move || {
            ctx.post(move |_| {
                *slot.lock() = Some(std::thread::current().id());
            })
            .unwrap();
        })
        .join()
        .unwrap();

        assert!(observed.lock().is_none());
        scheduler.tick(FRAME);
        assert_eq!(*observed.lock(), Some(control));
    }

    #[test]
    fn test_posted_job_can_spawn_local_tasks() {
        let mut scheduler = HostScheduler::new();
        let ctx = scheduler.control_context();

        ctx.post(|spawner| {
            spawner.spawn_local(async {
                yield_now().await;
            });
        })
        .unwrap();

        // Posted job spawns during tick 1; the task is adopted and yields.
        scheduler.tick(FRAME);
        assert_eq!(scheduler.task_count(), 1);
        scheduler.tick(FRAME);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_post_after_drop_fails() {
        let scheduler = HostScheduler::new();
        let ctx = scheduler.control_context();
        drop(scheduler);

        assert_eq!(ctx.post(|_| {}), Err(HostError::SchedulerClosed));
    }

    #[test]
    fn test_systems_update_before_tasks() {
        struct Counter(Mutex<u32>);
        impl HostSystem for Counter {
            fn update(&self) {
                *self.0.lock() += 1;
            }
        }

        let mut scheduler = HostScheduler::new();
        let counter = Arc::new(Counter(Mutex::new(0)));
        scheduler.add_system(counter.clone());

        let observed = Rc::new(Cell::new(0));
        let probe = counter.clone();
        let out = observed.clone();
        scheduler.spawn_local(async move { out.set(*probe.0.lock()) });

        scheduler.tick(FRAME);
        assert_eq!(observed.get(), 1);
    }
}
