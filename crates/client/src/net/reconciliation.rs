use std::time::{Duration, Instant};

use glam::Vec2;

use rally::{GameState, GameStatus, Paddle, PlayerSide, ServerSnapshot, SnapshotBuffer};

use super::config::ClientConfig;
use super::interpolation::{BallExtrapolator, PaddlePredictor};

/// What [`ReconciliationEngine::apply_snapshot`] did with a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Smoothing was bypassed and the snapshot was taken as is.
    pub immediate: bool,
    /// The local paddle was moved to this server value.
    pub local_snap: Option<f32>,
}

/// Owns the rendered [`GameState`] and merges authoritative snapshots into it.
pub struct ReconciliationEngine {
    config: ClientConfig,
    state: GameState,
    buffer: SnapshotBuffer,
    remote: PaddlePredictor,
    ball: BallExtrapolator,
    local_side: Option<PlayerSide>,
    applied_scores: Option<(u32, u32)>,
    server_local_y: Option<f32>,
    drift_since: Option<Instant>,
    applied: u64,
}

impl ReconciliationEngine {
    pub fn new(config: ClientConfig) -> Self {
        let ball = BallExtrapolator::new(config.extrapolation.clone());
        Self::with_extrapolator(config, ball)
    }

    pub fn with_extrapolator(config: ClientConfig, ball: BallExtrapolator) -> Self {
        let state = GameState::new(config.field.width, config.field.height);
        Self {
            buffer: SnapshotBuffer::new(config.snapshot_capacity),
            state,
            remote: PaddlePredictor::new(),
            ball,
            local_side: None,
            applied_scores: None,
            server_local_y: None,
            drift_since: None,
            applied: 0,
            config,
        }
    }

    pub fn set_local_side(&mut self, side: PlayerSide) {
        self.local_side = Some(side);
    }

    pub fn local_side(&self) -> Option<PlayerSide> {
        self.local_side
    }

    /// Forgets merge history so the next snapshot is applied as a first one.
    pub fn begin_session(&mut self) {
        self.buffer.clear();
        self.applied_scores = None;
        self.server_local_y = None;
        self.drift_since = None;
        self.remote.reset();
    }

    pub fn has_snapshot(&self) -> bool {
        self.applied_scores.is_some()
    }

    pub fn apply_snapshot(&mut self, server: GameState, now: Instant) -> ApplyOutcome {
        let immediate = self
            .applied_scores
            .is_none_or(|scores| scores != server.scores());
        self.merge(server, now, immediate)
    }

    /// Applies a snapshot without smoothing, as for the final state of a game.
    pub fn apply_final(&mut self, server: GameState, now: Instant) -> ApplyOutcome {
        self.merge(server, now, true)
    }

    fn merge(&mut self, server: GameState, now: Instant, immediate: bool) -> ApplyOutcome {
        let first = self.applied_scores.is_none();
        if let Some(evicted) = self.buffer.push(ServerSnapshot::new(server, now)) {
            log::trace!("Evicted snapshot received at {:?}", evicted.received_at);
        }
        let Some(latest) = self.buffer.latest() else {
            return ApplyOutcome::default();
        };
        let mut next = latest.state.clone();

        self.applied += 1;
        self.applied_scores = Some(next.scores());
        self.server_local_y = self.local_side.map(|side| next.paddle(side).y);

        // Nothing has been predicted yet, so the server value is the only one.
        if first {
            if let Some(side) = self.local_side {
                self.remote.snap(next.paddle(side.opponent()).y, now);
            }
            self.ball.set_basis(&next.ball, true);
            self.drift_since = None;
            self.state = next;
            return ApplyOutcome {
                immediate: true,
                local_snap: self.server_local_y,
            };
        }

        let mut local_snap = None;
        if let Some(side) = self.local_side {
            let server_y = next.paddle(side).y;
            let local_y = self.state.paddle(side).y;
            if (server_y - local_y).abs() > self.config.divergence_threshold {
                log::debug!(
                    "Local paddle diverged by {:.1}, snapping to server",
                    (server_y - local_y).abs()
                );
                local_snap = Some(server_y);
                self.drift_since = None;
            } else {
                next.paddle_mut(side).y = local_y;
            }

            let remote = side.opponent();
            if immediate {
                self.remote.snap(next.paddle(remote).y, now);
            } else {
                self.remote.set_target(next.paddle(remote).y, now);
                next.paddle_mut(remote).y = self
                    .remote
                    .current()
                    .unwrap_or(self.state.paddle(remote).y);
            }
        }

        if immediate {
            log::debug!(
                "Applied snapshot immediately (score {}-{})",
                next.left_paddle.score,
                next.right_paddle.score
            );
        }
        self.ball.set_basis(&next.ball, immediate);
        self.state = next;

        ApplyOutcome {
            immediate,
            local_snap,
        }
    }

    /// Per-frame smoothing. Returns a local paddle position if drift resync moved it.
    pub fn step(&mut self, now: Instant, dt: f32, ping_ms: f32, local_idle: bool) -> Option<f32> {
        if !self.has_snapshot() {
            return None;
        }

        if let Some(side) = self.local_side {
            let remote = side.opponent();
            let duration = self.config.interpolation.duration_for_ping(ping_ms);
            let max_y = self.state.paddle(remote).max_y(self.config.field.height);
            if let Some(y) = self.remote.step(
                now,
                duration,
                self.config.interpolation.velocity_factor,
                max_y,
            ) {
                self.state.paddle_mut(remote).y = y;
            }
        }

        if self.state.status == GameStatus::Playing {
            let paddles = [self.state.left_paddle, self.state.right_paddle];
            let position = self.ball.step(dt, &self.config.field, &paddles);
            self.state.ball.x = position.x;
            self.state.ball.y = position.y;
        }

        self.resync_drift(now, local_idle)
    }

    fn resync_drift(&mut self, now: Instant, local_idle: bool) -> Option<f32> {
        let after = self.config.drift_resync_after?;
        let side = self.local_side?;
        let server_y = self.server_local_y?;

        let local_y = self.state.paddle(side).y;
        let drifting = (server_y - local_y).abs() > self.config.movement_threshold;
        if !local_idle || !drifting {
            self.drift_since = None;
            return None;
        }

        let since = *self.drift_since.get_or_insert(now);
        if now.saturating_duration_since(since) < after {
            return None;
        }

        log::debug!("Resyncing idle local paddle from {:.1} to {:.1}", local_y, server_y);
        self.state.paddle_mut(side).y = server_y;
        self.drift_since = None;
        Some(server_y)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn set_status(&mut self, status: GameStatus) {
        self.state.status = status;
    }

    pub fn local_paddle(&self) -> Option<&Paddle> {
        self.local_side.map(|side| self.state.paddle(side))
    }

    pub fn set_local_paddle_y(&mut self, y: f32) {
        if let Some(side) = self.local_side {
            self.state.paddle_mut(side).y = y;
        }
    }

    pub fn trail(&self) -> Vec<Vec2> {
        self.ball.trail().collect()
    }

    /// Snapshots merged since startup.
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn remote_target(&self) -> Option<f32> {
        self.remote.target()
    }

    pub fn drift_age(&self, now: Instant) -> Option<Duration> {
        self.drift_since
            .map(|since| now.saturating_duration_since(since))
    }
}
