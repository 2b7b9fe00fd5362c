use std::collections::VecDeque;
use std::time::Instant;

const SAMPLE_COUNT: usize = 60;

/// Rolling frame rate and snapshot arrival rate for the HUD.
pub struct DebugStats {
    frame_times: VecDeque<f32>,
    snapshot_times: VecDeque<Instant>,
    fps: f32,
    snapshot_rate: f32,
    snapshots_seen: u64,
}

impl Default for DebugStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugStats {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(SAMPLE_COUNT),
            snapshot_times: VecDeque::with_capacity(SAMPLE_COUNT),
            fps: 0.0,
            snapshot_rate: 0.0,
            snapshots_seen: 0,
        }
    }

    pub fn record_frame(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        if self.frame_times.len() >= SAMPLE_COUNT {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);

        let avg_dt: f32 = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.fps = 1.0 / avg_dt;
    }

    /// Catches up with the engine's running snapshot counter.
    pub fn observe_snapshots(&mut self, total: u64, now: Instant) {
        let fresh = total.saturating_sub(self.snapshots_seen);
        self.snapshots_seen = total;
        for _ in 0..fresh.min(SAMPLE_COUNT as u64) {
            self.record_snapshot(now);
        }
    }

    pub fn record_snapshot(&mut self, now: Instant) {
        if self.snapshot_times.len() >= SAMPLE_COUNT {
            self.snapshot_times.pop_front();
        }
        self.snapshot_times.push_back(now);

        if self.snapshot_times.len() >= 2 {
            if let Some(oldest) = self.snapshot_times.front() {
                let elapsed = now.saturating_duration_since(*oldest).as_secs_f32();
                if elapsed > 0.0 {
                    self.snapshot_rate = (self.snapshot_times.len() - 1) as f32 / elapsed;
                }
            }
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn snapshot_rate(&self) -> f32 {
        self.snapshot_rate
    }
}
