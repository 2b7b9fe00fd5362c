use std::time::Duration;

use rally::state::{
    DEFAULT_BALL_RADIUS, DEFAULT_FIELD_HEIGHT, DEFAULT_FIELD_WIDTH, DEFAULT_PADDLE_HEIGHT,
};

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws/game";

/// Server velocities are expressed per frame at this rate.
pub const REFERENCE_FRAME_RATE: f32 = 60.0;

#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    pub paddle_height: f32,
    pub ball_radius: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FIELD_WIDTH,
            height: DEFAULT_FIELD_HEIGHT,
            paddle_height: DEFAULT_PADDLE_HEIGHT,
            ball_radius: DEFAULT_BALL_RADIUS,
        }
    }
}

/// Remote paddle smoothing. The blend duration tracks the measured ping.
#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    pub ping_factor: f32,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub velocity_factor: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            ping_factor: 1.0,
            min_duration: Duration::from_millis(50),
            max_duration: Duration::from_millis(200),
            velocity_factor: 0.3,
        }
    }
}

impl InterpolationConfig {
    pub fn duration_for_ping(&self, ping_ms: f32) -> Duration {
        let micros = (ping_ms.max(0.0) * self.ping_factor * 1000.0).round() as u64;
        Duration::from_micros(micros).clamp(self.min_duration, self.max_duration)
    }
}

#[derive(Debug, Clone)]
pub struct ExtrapolationConfig {
    pub overshoot: f32,
    pub bounce_jitter_degrees: f32,
    pub out_of_bounds_damping: f32,
    pub trail_length: usize,
}

impl Default for ExtrapolationConfig {
    fn default() -> Self {
        Self {
            overshoot: 1.05,
            bounce_jitter_degrees: 3.0,
            out_of_bounds_damping: 0.9,
            trail_length: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub token: Option<String>,
    pub field: FieldConfig,
    pub interpolation: InterpolationConfig,
    pub extrapolation: ExtrapolationConfig,
    pub send_rate: u32,
    pub movement_threshold: f32,
    pub divergence_threshold: f32,
    pub snapshot_capacity: usize,
    pub outbound_queue_capacity: usize,
    pub ping_interval: Duration,
    pub rtt_smoothing: f32,
    pub supervisor_check_interval: Duration,
    pub disconnect_timeout: Duration,
    pub reconnect_initial_backoff: Duration,
    pub reconnect_max_backoff: Duration,
    pub completion_grace: Duration,
    /// Snap an idle local paddle back to the server value after drifting this long.
    pub drift_resync_after: Option<Duration>,
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            token: None,
            field: FieldConfig::default(),
            interpolation: InterpolationConfig::default(),
            extrapolation: ExtrapolationConfig::default(),
            send_rate: 30,
            movement_threshold: 2.0,
            divergence_threshold: 25.0,
            snapshot_capacity: rally::DEFAULT_SNAPSHOT_CAPACITY,
            outbound_queue_capacity: 256,
            ping_interval: Duration::from_secs(1),
            rtt_smoothing: 0.2,
            supervisor_check_interval: Duration::from_millis(250),
            disconnect_timeout: Duration::from_secs(10),
            reconnect_initial_backoff: Duration::from_millis(500),
            reconnect_max_backoff: Duration::from_secs(4),
            completion_grace: Duration::from_secs(3),
            drift_resync_after: None,
            frame_rate: 60,
        }
    }
}

impl ClientConfig {
    /// Smallest gap between two position reports, rounded up to the nanosecond.
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000u64.div_ceil(self.send_rate.max(1) as u64))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000u64 / self.frame_rate.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_interval_rounds_up() {
        let config = ClientConfig::default();
        assert_eq!(config.min_send_interval(), Duration::from_nanos(33_333_334));
        assert!(config.min_send_interval() * 30 > Duration::from_secs(1));
    }

    #[test]
    fn test_duration_follows_ping_within_band() {
        let config = InterpolationConfig::default();

        assert_eq!(config.duration_for_ping(0.0), Duration::from_millis(50));
        assert_eq!(config.duration_for_ping(120.0), Duration::from_millis(120));
        assert_eq!(config.duration_for_ping(900.0), Duration::from_millis(200));
    }
}
