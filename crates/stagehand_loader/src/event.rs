//! Transition events and outcomes

use stagehand_core::OperationId;

/// Terminal state of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Both phases finished and the callback (if any) ran
    Completed,
    /// Cancellation was observed at a checkpoint
    Cancelled,
    /// The backend faulted
    Failed(String),
}

/// Step of an operation's life
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEventKind {
    /// Accepted by the entry point
    Accepted,
    /// Body started on the control thread
    Started,
    /// Backend request issued
    Requested,
    /// Phase one ready
    Staged,
    /// Activation released
    Committed,
    /// Phase two ready
    Activated,
    /// Finished
    Completed,
    /// Cancelled
    Cancelled,
    /// Backend fault
    Failed(String),
}

/// Event from the transition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Operation the event belongs to
    pub operation: OperationId,
    /// What happened
    pub kind: TransitionEventKind,
}

impl TransitionEvent {
    /// Create an event
    pub fn new(operation: OperationId, kind: TransitionEventKind) -> Self {
        Self { operation, kind }
    }
}
