//! Loader configuration
//!
//! ```toml
//! debug_delay_ms = 1000        # minimum phase-one latency, 0 disables
//! debug_yield_logging = true   # log every cooperative yield
//! handoff = "direct"           # direct, worker
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use stagehand_core::{Result, StagehandError};

/// How an accepted operation reaches the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandOff {
    /// Post the operation straight onto the control context
    #[default]
    Direct,
    /// Start on a short-lived worker thread that posts it back
    Worker,
}

impl std::fmt::Display for HandOff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

impl std::str::FromStr for HandOff {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" | "" => Ok(Self::Direct),
            "worker" | "thread" => Ok(Self::Worker),
            _ => Err(format!("Unknown hand-off: {}", s)),
        }
    }
}

/// Scene transition engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Artificial minimum time before phase one may report ready
    pub debug_delay_ms: u32,
    /// Log each cooperative yield with its iteration count
    pub debug_yield_logging: bool,
    /// Hand-off strategy
    pub handoff: HandOff,
}

impl LoaderConfig {
    /// Parse from TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| StagehandError::Config(e.to_string()))
    }

    /// Set the debug delay
    pub fn with_debug_delay(mut self, millis: u32) -> Self {
        self.debug_delay_ms = millis;
        self
    }

    /// Enable or disable yield logging
    pub fn with_yield_logging(mut self, enabled: bool) -> Self {
        self.debug_yield_logging = enabled;
        self
    }

    /// Set the hand-off strategy
    pub fn with_handoff(mut self, handoff: HandOff) -> Self {
        self.handoff = handoff;
        self
    }
}

/// Debug knobs the engine reads on every poll
#[derive(Debug, Default)]
pub(crate) struct DebugOptions {
    delay_ms: AtomicU32,
    yield_logging: AtomicBool,
}

impl DebugOptions {
    pub(crate) fn new(config: &LoaderConfig) -> Self {
        Self {
            delay_ms: AtomicU32::new(config.debug_delay_ms),
            yield_logging: AtomicBool::new(config.debug_yield_logging),
        }
    }

    pub(crate) fn delay_ms(&self) -> u32 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn set_delay_ms(&self, millis: u32) {
        self.delay_ms.store(millis, Ordering::Relaxed);
    }

    /// The configured delay, if any
    pub(crate) fn delay(&self) -> Option<Duration> {
        match self.delay_ms() {
            0 => None,
            millis => Some(Duration::from_millis(millis as u64)),
        }
    }

    pub(crate) fn yield_logging(&self) -> bool {
        self.yield_logging.load(Ordering::Relaxed)
    }

    pub(crate) fn set_yield_logging(&self, enabled: bool) {
        self.yield_logging.store(enabled, Ordering::Relaxed);
    }
}
