//! Error types shared across Stagehand

use thiserror::Error;

/// Faults raised by a host scene backend or the host scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// No scene is registered under this name or address
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    /// The scene exists but is not currently loaded
    #[error("Scene not loaded: {0}")]
    SceneNotLoaded(String),

    /// The handle was already consumed or never produced a result
    #[error("Invalid operation handle: {0}")]
    InvalidHandle(String),

    /// The scheduler owning the control context has shut down
    #[error("Host scheduler is closed")]
    SchedulerClosed,

    /// The hand-off worker thread could not be started
    #[error("Hand-off failed: {0}")]
    HandOff(String),
}

/// Stagehand errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagehandError {
    /// An entry point was called off the control thread
    #[error("{operation} should be called on the control thread")]
    NotControlThread { operation: &'static str },

    /// Another operation is already in flight
    #[error("{operation}: another operation is already in flight")]
    Busy { operation: &'static str },

    /// Backend fault
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StagehandError {
    /// Check if this error is caller misuse rather than a runtime fault
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::NotControlThread { .. } | Self::Busy { .. })
    }
}

/// Result type for Stagehand operations
pub type Result<T> = std::result::Result<T, StagehandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StagehandError::Busy { operation: "load_scene" };
        assert_eq!(err.to_string(), "load_scene: another operation is already in flight");

        let err: StagehandError = HostError::SceneNotFound("Level9".into()).into();
        assert_eq!(err.to_string(), "Host error: Scene not found: Level9");
    }

    #[test]
    fn test_misuse_classification() {
        assert!(StagehandError::NotControlThread { operation: "unload_scene" }.is_misuse());
        assert!(!StagehandError::Host(HostError::SchedulerClosed).is_misuse());
        assert!(!StagehandError::Config("bad".into()).is_misuse());
    }
}
