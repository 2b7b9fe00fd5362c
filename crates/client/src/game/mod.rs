mod input;

use std::time::Instant;

pub use input::{KeyCommand, KeyboardInput};

const MAX_FRAME_DT: f32 = 0.1;

/// Frame delta source. Long stalls are clamped so a hiccup never teleports paddles.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_frame_time: Option<Instant>,
}

impl FrameClock {
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = self
            .last_frame_time
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0)
            .min(MAX_FRAME_DT);
        self.last_frame_time = Some(now);
        dt
    }
}
