use std::time::{Duration, Instant};

use rally::Paddle;

use super::config::REFERENCE_FRAME_RATE;
use super::input::InputState;

/// Moves the locally controlled paddle ahead of the server and decides when
/// a position report is worth sending.
///
/// A report goes out only when the paddle moved at least `threshold` away
/// from the last reported value and at least `min_interval` passed since the
/// previous report. Movement that clears the threshold too early is held as
/// pending and released by [`LocalInputPredictor::flush`].
#[derive(Debug, Clone)]
pub struct LocalInputPredictor {
    threshold: f32,
    min_interval: Duration,
    last_sent: Option<f32>,
    last_send_at: Option<Instant>,
    pending: Option<f32>,
}

impl LocalInputPredictor {
    pub fn new(threshold: f32, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            last_sent: None,
            last_send_at: None,
            pending: None,
        }
    }

    /// Candidate paddle position after `dt` seconds of `input`, kept on the field.
    pub fn predict(&self, input: InputState, paddle: &Paddle, field_height: f32, dt: f32) -> f32 {
        let delta = input.direction() * paddle.speed * REFERENCE_FRAME_RATE * dt;
        paddle.clamp_y(paddle.y + delta, field_height)
    }

    /// Feeds the freshly predicted position. Returns the value to report now, if any.
    pub fn observe(&mut self, position: f32, now: Instant) -> Option<f32> {
        if !self.exceeds_threshold(position) {
            if self.pending.take().is_some() {
                log::debug!("Pending paddle report cancelled at {:.1}", position);
            }
            return None;
        }

        if self.interval_elapsed(now) {
            self.pending = None;
            self.mark_sent(position, now);
            return Some(position);
        }

        self.pending = Some(position);
        None
    }

    /// Releases a pending report once the send interval allows it.
    pub fn flush(&mut self, now: Instant) -> Option<f32> {
        let position = self.pending?;
        if !self.interval_elapsed(now) {
            return None;
        }

        self.pending = None;
        self.mark_sent(position, now);
        Some(position)
    }

    /// Adopts a server-confirmed position as the reporting baseline.
    pub fn rebase(&mut self, position: f32) {
        self.last_sent = Some(position);
        if self.pending.is_some_and(|p| !self.exceeds_threshold(p)) {
            self.pending = None;
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_send_at = None;
        self.pending = None;
    }

    pub fn pending(&self) -> Option<f32> {
        self.pending
    }

    pub fn last_sent(&self) -> Option<f32> {
        self.last_sent
    }

    fn exceeds_threshold(&self, position: f32) -> bool {
        match self.last_sent {
            Some(last) => (position - last).abs() >= self.threshold,
            None => true,
        }
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        self.last_send_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.min_interval)
    }

    fn mark_sent(&mut self, position: f32, now: Instant) {
        self.last_sent = Some(position);
        self.last_send_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const INTERVAL: Duration = Duration::from_nanos(33_333_334);
    const FIELD_HEIGHT: f32 = 600.0;

    fn predictor() -> LocalInputPredictor {
        LocalInputPredictor::new(2.0, INTERVAL)
    }

    #[test]
    fn test_predict_moves_and_clamps() {
        let predictor = predictor();
        let mut paddle = Paddle::new(20.0, FIELD_HEIGHT);
        paddle.y = 250.0;

        let down = InputState {
            up: false,
            down: true,
        };
        let y = predictor.predict(down, &paddle, FIELD_HEIGHT, 1.0 / 60.0);
        assert!((y - 258.0).abs() < 0.001);

        paddle.y = 495.0;
        assert_eq!(predictor.predict(down, &paddle, FIELD_HEIGHT, 0.1), 500.0);

        paddle.y = 3.0;
        let up = InputState {
            up: true,
            down: false,
        };
        assert_eq!(predictor.predict(up, &paddle, FIELD_HEIGHT, 0.1), 0.0);
    }

    #[test]
    fn test_small_moves_are_not_reported() {
        let mut predictor = predictor();
        let start = Instant::now();
        predictor.rebase(250.0);

        assert_eq!(predictor.observe(251.5, start), None);
        assert_eq!(predictor.pending(), None);
        assert_eq!(predictor.observe(252.0, start), Some(252.0));
    }

    #[test]
    fn test_early_move_becomes_pending_then_flushes() {
        let mut predictor = predictor();
        let start = Instant::now();
        predictor.rebase(250.0);

        assert_eq!(predictor.observe(260.0, start), Some(260.0));
        assert_eq!(predictor.observe(270.0, start + Duration::from_millis(10)), None);
        assert_eq!(predictor.pending(), Some(270.0));

        assert_eq!(predictor.flush(start + Duration::from_millis(20)), None);
        assert_eq!(predictor.flush(start + INTERVAL), Some(270.0));
        assert_eq!(predictor.pending(), None);
    }

    #[test]
    fn test_pending_discarded_when_back_near_last_sent() {
        let mut predictor = predictor();
        let start = Instant::now();
        predictor.rebase(250.0);

        predictor.observe(260.0, start);
        predictor.observe(270.0, start + Duration::from_millis(5));
        assert!(predictor.pending().is_some());

        assert_eq!(predictor.observe(261.0, start + Duration::from_millis(10)), None);
        assert_eq!(predictor.pending(), None);
        assert_eq!(predictor.flush(start + INTERVAL), None);
    }

    #[test]
    fn test_rebase_drops_stale_pending() {
        let mut predictor = predictor();
        let start = Instant::now();
        predictor.rebase(250.0);

        predictor.observe(260.0, start);
        predictor.observe(300.0, start + Duration::from_millis(5));

        predictor.rebase(299.0);
        assert_eq!(predictor.pending(), None);
    }

    fn simulate(steps: &[(u64, i8)]) -> (Vec<Duration>, f32, Option<f32>) {
        let mut predictor = predictor();
        let start = Instant::now();
        let mut paddle = Paddle::new(20.0, FIELD_HEIGHT);
        predictor.rebase(paddle.y);

        let mut now = start;
        let mut sends = Vec::new();
        let mut last_report = Some(paddle.y);

        for &(step_ms, direction) in steps {
            now += Duration::from_millis(step_ms);
            let input = InputState {
                up: direction < 0,
                down: direction > 0,
            };

            paddle.y = predictor.predict(input, &paddle, FIELD_HEIGHT, step_ms as f32 / 1000.0);
            for report in [predictor.flush(now), predictor.observe(paddle.y, now)]
                .into_iter()
                .flatten()
            {
                sends.push(now - start);
                last_report = Some(report);
            }
        }

        // Quiet period: the dispatch timer keeps firing.
        for _ in 0..3 {
            now += INTERVAL;
            if let Some(report) = predictor.flush(now) {
                sends.push(now - start);
                last_report = Some(report);
            }
        }

        (sends, paddle.y, last_report)
    }

    proptest! {
        #[test]
        fn prop_never_more_than_30_reports_per_second(
            steps in prop::collection::vec((1u64..40, -1i8..=1), 1..400)
        ) {
            let (sends, _, _) = simulate(&steps);
            for (i, first) in sends.iter().enumerate() {
                let in_window = sends[i..]
                    .iter()
                    .take_while(|t| **t - *first <= Duration::from_secs(1))
                    .count();
                prop_assert!(in_window <= 30, "{} reports within one second", in_window);
            }
        }

        #[test]
        fn prop_final_position_is_reported(
            steps in prop::collection::vec((1u64..40, -1i8..=1), 1..400)
        ) {
            let (_, final_y, last_report) = simulate(&steps);
            let last_report = last_report.unwrap_or(f32::NAN);
            prop_assert!(
                (final_y - last_report).abs() < 2.0,
                "final {} last report {}",
                final_y,
                last_report
            );
        }
    }
}
