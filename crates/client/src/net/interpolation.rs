use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rally::{Ball, Paddle};

use super::config::{ExtrapolationConfig, FieldConfig, REFERENCE_FRAME_RATE};

const MIN_DAMPED_SPEED: f32 = 1.0;

/// Smooths the opponent paddle toward the latest server value.
///
/// `current` blends linearly from where it was when the target arrived, and a
/// velocity lead fades out as the blend completes so the paddle lands exactly
/// on `target`.
#[derive(Debug, Clone, Default)]
pub struct PaddlePredictor {
    current: Option<f32>,
    target: Option<f32>,
    origin: f32,
    /// Units per second, estimated from consecutive targets.
    velocity: f32,
    last_update_time: Option<Instant>,
}

impl PaddlePredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, target: f32, now: Instant) {
        let Some(current) = self.current else {
            self.snap(target, now);
            return;
        };

        self.velocity = match (self.target, self.last_update_time) {
            (Some(previous), Some(at)) => {
                let elapsed = now.saturating_duration_since(at).as_secs_f32();
                if elapsed > 0.0 {
                    (target - previous) / elapsed
                } else {
                    self.velocity
                }
            }
            _ => 0.0,
        };
        self.origin = current;
        self.target = Some(target);
        self.last_update_time = Some(now);
    }

    pub fn snap(&mut self, value: f32, now: Instant) {
        self.current = Some(value);
        self.target = Some(value);
        self.origin = value;
        self.velocity = 0.0;
        self.last_update_time = Some(now);
    }

    /// Advances `current` for this frame and returns it.
    pub fn step(
        &mut self,
        now: Instant,
        duration: Duration,
        velocity_factor: f32,
        max_y: f32,
    ) -> Option<f32> {
        let target = self.target?;
        let last_update = self.last_update_time?;

        let elapsed = now.saturating_duration_since(last_update).as_secs_f32();
        let t = if duration.is_zero() {
            1.0
        } else {
            (elapsed / duration.as_secs_f32()).clamp(0.0, 1.0)
        };

        let blended = self.origin + (target - self.origin) * t;
        let lead = self.velocity * elapsed * velocity_factor * (1.0 - t);
        let current = (blended + lead).clamp(0.0, max_y.max(0.0));

        self.current = Some(current);
        Some(current)
    }

    pub fn current(&self) -> Option<f32> {
        self.current
    }

    pub fn target(&self) -> Option<f32> {
        self.target
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Advances the ball between snapshots from the last authoritative basis.
///
/// Wall bounces are replayed locally with a small random deflection. Paddle
/// hits are left to the server: the rendered ball is only pushed out of the
/// local paddle, never reflected.
#[derive(Debug, Clone)]
pub struct BallExtrapolator {
    config: ExtrapolationConfig,
    position: Vec2,
    /// Units per second.
    velocity: Vec2,
    radius: f32,
    trail: VecDeque<Vec2>,
    rng: StdRng,
}

impl BallExtrapolator {
    pub fn new(config: ExtrapolationConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: ExtrapolationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ExtrapolationConfig, rng: StdRng) -> Self {
        let capacity = config.trail_length;
        Self {
            config,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            radius: 0.0,
            trail: VecDeque::with_capacity(capacity),
            rng,
        }
    }

    /// Records a server ball as the new extrapolation basis.
    pub fn set_basis(&mut self, ball: &Ball, clear_history: bool) {
        self.position = Vec2::new(ball.x, ball.y);
        self.velocity = Vec2::new(ball.dx, ball.dy) * REFERENCE_FRAME_RATE;
        self.radius = ball.radius;
        if clear_history {
            self.trail.clear();
        }
    }

    /// Advances one frame, keeping the ball out of every paddle in `paddles`.
    pub fn step(&mut self, dt: f32, field: &FieldConfig, paddles: &[Paddle]) -> Vec2 {
        self.position += self.velocity * self.config.overshoot * dt;

        if self.position.y - self.radius < 0.0 && self.velocity.y < 0.0 {
            self.position.y = self.radius;
            self.bounce(1.0);
        } else if self.position.y + self.radius > field.height && self.velocity.y > 0.0 {
            self.position.y = field.height - self.radius;
            self.bounce(-1.0);
        }

        for paddle in paddles {
            self.push_out_of(paddle, field.width);
        }

        if self.position.x < 0.0 || self.position.x > field.width {
            // Scored or about to be. Slow down and wait for the server reset.
            if self.velocity.length() > MIN_DAMPED_SPEED {
                self.velocity *= self.config.out_of_bounds_damping;
            }
        }

        if self.config.trail_length > 0 {
            if self.trail.len() >= self.config.trail_length {
                self.trail.pop_front();
            }
            self.trail.push_back(self.position);
        }

        self.position
    }

    /// Reflects the vertical component toward `sign` and perturbs the angle.
    fn bounce(&mut self, sign: f32) {
        self.velocity.y = self.velocity.y.abs() * sign;

        let jitter = self.config.bounce_jitter_degrees.abs().to_radians();
        if jitter > 0.0 {
            let angle = self.rng.random_range(-jitter..=jitter);
            let rotated = Vec2::from_angle(angle).rotate(self.velocity);
            // Keep heading away from the wall.
            if rotated.y * sign > 0.0 {
                self.velocity = rotated;
            }
        }
    }

    fn push_out_of(&mut self, paddle: &Paddle, field_width: f32) {
        let closest = Vec2::new(
            self.position.x.clamp(paddle.x, paddle.x + paddle.width),
            self.position.y.clamp(paddle.y, paddle.y + paddle.height),
        );
        if self.position.distance_squared(closest) >= self.radius * self.radius {
            return;
        }

        if paddle.x + paddle.width / 2.0 < field_width / 2.0 {
            self.position.x = paddle.x + paddle.width + self.radius;
        } else {
            self.position.x = paddle.x - self.radius;
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn trail(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.trail.iter().copied()
    }
}
