//! Two-phase polling state machine
//!
//! `Idle -> Phase1Polling -> CommitPoint -> Phase2Polling -> Completed`, with
//! `Cancelled` reachable from entry and from either polling loop. Every loop
//! iteration starts with a cancellation checkpoint and ends with one
//! cooperative yield, so the machine never holds the control thread for more
//! than a single poll.

use parking_lot::Mutex;

use stagehand_core::{HostError, OperationId};
use stagehand_host::{yield_now, CancellationToken, Cancelled, Checkpoint, FrameClock};

use crate::backend::TwoPhaseOperation;
use crate::config::DebugOptions;
use crate::event::{TransitionEvent, TransitionEventKind};

/// Why the machine stopped before completing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// Cancellation observed at a checkpoint
    Cancelled,
    /// Backend fault
    Failed(HostError),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Interrupt::Cancelled
    }
}

impl From<HostError> for Interrupt {
    fn from(e: HostError) -> Self {
        Interrupt::Failed(e)
    }
}

/// Phase being polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Staging,
    Activating,
}

/// Everything one run of the machine reads or reports to
pub(crate) struct PollContext<'a> {
    pub operation: OperationId,
    pub label: &'static str,
    pub token: &'a CancellationToken,
    pub clock: &'a FrameClock,
    pub debug: &'a DebugOptions,
    pub events: &'a Mutex<Vec<TransitionEvent>>,
}

impl PollContext<'_> {
    fn emit(&self, kind: TransitionEventKind) {
        self.events
            .lock()
            .push(TransitionEvent::new(self.operation, kind));
    }

    async fn pause(&self, phase: Phase, count: &mut u32) {
        if self.debug.yield_logging() {
            log::info!("{} {} {:?} yield:{}", self.label, self.operation, phase, count);
        }
        *count += 1;
        yield_now().await;
    }
}

/// Drive `op` through both phases
pub(crate) async fn drive<Op>(mut op: Op, ctx: &PollContext<'_>) -> Result<Op::Output, Interrupt>
where
    Op: TwoPhaseOperation,
{
    ctx.token.check()?;
    ctx.emit(TransitionEventKind::Started);

    // Never finish in the tick the operation was issued in.
    yield_now().await;

    op.begin()?;
    ctx.emit(TransitionEventKind::Requested);
    let start = ctx.clock.time();
    let mut count = 0u32;

    loop {
        ctx.token.check()?;

        let elapsed = ctx.clock.time().saturating_sub(start);
        let held = ctx.debug.delay().map_or(false, |delay| elapsed < delay);
        if !held && op.poll_staged() {
            break;
        }
        ctx.pause(Phase::Staging, &mut count).await;
    }
    ctx.emit(TransitionEventKind::Staged);

    op.commit()?;
    ctx.emit(TransitionEventKind::Committed);

    loop {
        ctx.token.check()?;
        if op.poll_activated() {
            break;
        }
        ctx.pause(Phase::Activating, &mut count).await;
    }
    ctx.emit(TransitionEventKind::Activated);

    log::debug!(
        "{} {} finished on {} after {} yield(s)",
        ctx.label,
        ctx.operation,
        op.backend(),
        count
    );
    Ok(op.finish()?)
}
