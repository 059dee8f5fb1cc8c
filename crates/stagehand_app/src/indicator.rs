//! "Now Loading" indicator

use std::time::Duration;

const DOTS: [&str; 4] = ["", ".", "..", "..."];

/// Seconds per animation step
const STEP: f32 = 0.25;

/// Animated loading text, shown while a transition is in flight
#[derive(Debug, Default, Clone)]
pub struct LoadingIndicator {
    active: bool,
    elapsed: f32,
}

impl LoadingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        if active != self.active {
            log::debug!("Loading indicator {}", if active { "shown" } else { "hidden" });
        }
        self.active = active;
    }

    /// Advance the animation; time only accumulates while shown
    pub fn update(&mut self, delta_time: Duration) {
        if !self.active {
            return;
        }
        self.elapsed += delta_time.as_secs_f32();
    }

    /// Current text
    pub fn text(&self) -> String {
        let step = (self.elapsed / STEP) as usize & 3;
        format!("Now Loading{}", DOTS[step])
    }
}
