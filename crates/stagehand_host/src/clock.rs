//! Frame clock shared between the scheduler and its tasks

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Frame timing information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTiming {
    /// Frames ticked so far
    pub frame: u64,
    /// Total simulated time
    pub total_time: Duration,
    /// Last frame's delta time
    pub delta_time: Duration,
}

impl FrameTiming {
    /// Advance by one frame
    pub fn update(&mut self, delta_time: Duration) {
        self.frame += 1;
        self.delta_time = delta_time;
        self.total_time += delta_time;
    }
}

/// Cloneable read handle to the host's frame timing
///
/// Only the scheduler advances it; everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    timing: Arc<RwLock<FrameTiming>>,
}

impl FrameClock {
    /// Create a clock at frame zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frame number
    pub fn frame(&self) -> u64 {
        self.timing.read().frame
    }

    /// Total time since the clock started
    pub fn time(&self) -> Duration {
        self.timing.read().total_time
    }

    /// Delta of the last frame
    pub fn delta(&self) -> Duration {
        self.timing.read().delta_time
    }

    pub(crate) fn advance(&self, delta_time: Duration) -> FrameTiming {
        let mut timing = self.timing.write();
        timing.update(delta_time);
        *timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = FrameClock::new();
        let reader = clock.clone();

        clock.advance(Duration::from_millis(16));
        clock.advance(Duration::from_millis(16));

        assert_eq!(reader.frame(), 2);
        assert_eq!(reader.time(), Duration::from_millis(32));
        assert_eq!(reader.delta(), Duration::from_millis(16));
    }
}
