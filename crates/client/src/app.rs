use std::time::{Duration, Instant};

use glam::Vec2;

use rally::{ClientMessage, ConnectionState, GameState, GameStatus, PlayerSide, Transport};

use crate::game::FrameClock;
use crate::net::{
    ClientConfig, ConnectError, ConnectionManager, DisconnectionSupervisor, Inbound, InputState,
    Intent, IntentError, LocalInputPredictor, ReconciliationEngine, StatusMachine, Verdict,
};

/// What the render surface should draw over the field.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    Connecting,
    Reconnecting { attempt: u32, remaining: Duration },
    PeerDisconnected,
    Failed { reason: String },
}

/// Single-threaded client engine driven by one call to [`SyncEngine::tick`] per frame.
///
/// Each frame drains inbound traffic, lets the dispatch timer release held
/// position reports, runs local prediction, then reconciliation, then the
/// supervisor. The render surface reads the result afterwards.
pub struct SyncEngine<T: Transport> {
    config: ClientConfig,
    connection: ConnectionManager<T>,
    predictor: LocalInputPredictor,
    reconciliation: ReconciliationEngine,
    status: StatusMachine,
    supervisor: DisconnectionSupervisor,
    clock: FrameClock,
    failure: Option<String>,
    opponent_connected: bool,
    disconnect_at: Option<Instant>,
    running: bool,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let reconciliation = ReconciliationEngine::new(config.clone());
        Self::with_reconciliation(transport, config, reconciliation)
    }

    pub fn with_reconciliation(
        transport: T,
        config: ClientConfig,
        reconciliation: ReconciliationEngine,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(transport, &config),
            predictor: LocalInputPredictor::new(
                config.movement_threshold,
                config.min_send_interval(),
            ),
            reconciliation,
            status: StatusMachine::new(),
            supervisor: DisconnectionSupervisor::new(
                config.disconnect_timeout,
                config.supervisor_check_interval,
                config.reconnect_initial_backoff,
                config.reconnect_max_backoff,
            ),
            clock: FrameClock::default(),
            failure: None,
            opponent_connected: true,
            disconnect_at: None,
            running: false,
            config,
        }
    }

    /// Opens the connection and starts the frame loop.
    pub fn start(&mut self) -> Result<(), ConnectError> {
        self.connection.connect()?;
        self.running = true;
        Ok(())
    }

    pub fn tick(&mut self, now: Instant, input: InputState) {
        if !self.running {
            return;
        }
        let dt = self.clock.tick(now);

        for item in self.connection.poll(now) {
            self.route(item, now);
        }
        if !self.running {
            return;
        }

        if self.connection.dispatch_due(now) {
            if let Some(position) = self.predictor.flush(now) {
                self.send(ClientMessage::PaddleMove { position });
            }
        }

        self.update_local_paddle(now, input, dt);

        let ping_ms = self.connection.state().ping_ms;
        if let Some(y) = self.reconciliation.step(now, dt, ping_ms, input.is_idle()) {
            self.predictor.rebase(y);
        }

        self.supervise(now);
        self.connection.tick(now);

        if self.disconnect_at.is_some_and(|at| now >= at) {
            log::info!("Game complete, closing connection");
            self.disconnect_at = None;
            self.connection.disconnect();
        }
    }

    fn route(&mut self, item: Inbound, now: Instant) {
        match item {
            Inbound::Opened => {
                self.supervisor.connection_restored(now);
                self.reconciliation.begin_session();
                self.predictor.reset();
                self.opponent_connected = true;
            }
            Inbound::Lost { reason } => {
                if self.status.status().is_terminal() {
                    log::info!("Connection closed after game over: {}", reason);
                    self.disconnect_at = None;
                    return;
                }
                self.supervisor.connection_lost(now);
            }
            Inbound::Identity(side) => self.reconciliation.set_local_side(side),
            Inbound::Snapshot(state) => {
                self.status.apply_server(state.status, None);
                let outcome = self.reconciliation.apply_snapshot(state, now);
                self.reconciliation.set_status(self.status.status());
                if let Some(y) = outcome.local_snap {
                    self.predictor.rebase(y);
                }
            }
            Inbound::StatusChanged { status, reason } => {
                self.status.apply_server(status, reason);
                self.reconciliation.set_status(self.status.status());
            }
            Inbound::PlayerStatus { side, connected } => {
                if Some(side) != self.reconciliation.local_side() {
                    log::info!(
                        "Player {} {}",
                        side.number(),
                        if connected { "connected" } else { "disconnected" }
                    );
                    self.opponent_connected = connected;
                }
            }
            Inbound::ForceDisconnect { reason } => self.fail(reason),
            Inbound::GameCompleted(final_state) => {
                self.reconciliation.apply_final(final_state, now);
                self.status.complete();
                self.reconciliation.set_status(self.status.status());
                self.disconnect_at = Some(now + self.config.completion_grace);
            }
        }
    }

    fn update_local_paddle(&mut self, now: Instant, input: InputState, dt: f32) {
        if self.status.status() != GameStatus::Playing || !self.reconciliation.has_snapshot() {
            return;
        }
        let Some(paddle) = self.reconciliation.local_paddle() else {
            return;
        };

        let y = self
            .predictor
            .predict(input, paddle, self.config.field.height, dt);
        self.reconciliation.set_local_paddle_y(y);

        if !self.connection.is_connected() {
            return;
        }
        if let Some(position) = self.predictor.observe(y, now) {
            self.send(ClientMessage::PaddleMove { position });
        }
    }

    fn supervise(&mut self, now: Instant) {
        match self.supervisor.poll(now) {
            Verdict::Connected | Verdict::Waiting { .. } => {}
            Verdict::Reconnect { remaining } => {
                log::info!("Reconnecting, {:.1}s left", remaining.as_secs_f32());
                if let Err(e) = self.connection.connect() {
                    log::warn!("Reconnect attempt failed: {}", e);
                }
            }
            Verdict::Expired => self.fail("connection timed out".to_string()),
        }
    }

    fn send(&mut self, message: ClientMessage) {
        if let Err(e) = self.connection.send(&message) {
            log::error!("Failed to encode {}: {}", message.kind(), e);
        }
    }

    /// Terminal failure: every periodic task stops until [`SyncEngine::retry`].
    fn fail(&mut self, reason: String) {
        log::error!("Session failed: {}", reason);
        self.connection.disconnect();
        self.supervisor.stop();
        self.disconnect_at = None;
        self.running = false;
        self.failure = Some(reason);
    }

    pub fn request(&mut self, intent: Intent) -> Result<(), IntentError> {
        let message = self.status.request(intent)?;
        log::debug!("Requesting {}", message.kind());
        self.send(message);
        Ok(())
    }

    /// Space bar: start from the menu, otherwise pause or resume.
    pub fn primary_intent(&self) -> Intent {
        if self.status.status() == GameStatus::Menu {
            Intent::StartGame
        } else {
            Intent::TogglePause
        }
    }

    /// Manual retry after a terminal failure.
    pub fn retry(&mut self) -> Result<(), ConnectError> {
        if self.failure.is_none() {
            return Ok(());
        }
        log::info!("Retrying connection");
        self.failure = None;
        self.supervisor.reset();
        self.status.reset();
        self.reconciliation.set_status(self.status.status());
        self.reconciliation.begin_session();
        self.predictor.reset();
        self.clock = FrameClock::default();
        self.start()
    }

    /// Stops the frame loop and every timer, and closes the connection.
    pub fn shutdown(&mut self) {
        self.connection.disconnect();
        self.supervisor.stop();
        self.disconnect_at = None;
        self.running = false;
    }

    pub fn overlay(&self, now: Instant) -> Overlay {
        if let Some(reason) = &self.failure {
            return Overlay::Failed {
                reason: reason.clone(),
            };
        }
        if let Some(remaining) = self.supervisor.remaining(now) {
            return Overlay::Reconnecting {
                attempt: self.connection.state().reconnect_attempt,
                remaining,
            };
        }
        if self.connection.state().connecting {
            return Overlay::Connecting;
        }
        if !self.opponent_connected && !self.status.status().is_terminal() {
            return Overlay::PeerDisconnected;
        }
        Overlay::None
    }

    pub fn timers_active(&self) -> bool {
        self.running
            || self.connection.dispatch_active()
            || self.supervisor.is_running()
            || self.disconnect_at.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn state(&self) -> &GameState {
        self.reconciliation.state()
    }

    pub fn status(&self) -> GameStatus {
        self.status.status()
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status.reason()
    }

    pub fn connection(&self) -> &ConnectionState {
        self.connection.state()
    }

    pub fn local_side(&self) -> Option<PlayerSide> {
        self.reconciliation.local_side()
    }

    pub fn trail(&self) -> Vec<Vec2> {
        self.reconciliation.trail()
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.reconciliation.applied_count()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rally::{
        CLOSE_ABNORMAL, CLOSE_NORMAL, LoopbackServer, LoopbackTransport, ServerMessage,
        loopback_pair,
    };

    use crate::net::config::ExtrapolationConfig;
    use crate::net::interpolation::BallExtrapolator;

    const FRAME: Duration = Duration::from_millis(50);

    fn engine() -> (SyncEngine<LoopbackTransport>, LoopbackServer) {
        let (transport, server) = loopback_pair();
        let config = ClientConfig {
            server_url: "ws://localhost/game".to_string(),
            token: Some("token".to_string()),
            ..ClientConfig::default()
        };
        let ball = BallExtrapolator::with_seed(ExtrapolationConfig::default(), 9);
        let reconciliation = ReconciliationEngine::with_extrapolator(config.clone(), ball);
        (
            SyncEngine::with_reconciliation(transport, config, reconciliation),
            server,
        )
    }

    fn playing_state(left: u32, right: u32) -> GameState {
        let mut state = GameState::default();
        state.status = GameStatus::Playing;
        state.left_paddle.score = left;
        state.right_paddle.score = right;
        state.ball.dx = 5.0;
        state.ball.dy = 1.0;
        state
    }

    /// Connects, identifies as player 1 and applies a first snapshot.
    fn joined(now: Instant) -> (SyncEngine<LoopbackTransport>, LoopbackServer) {
        let (mut engine, server) = engine();
        server.set_auto_accept(true);
        engine.start().unwrap();
        server.push(&ServerMessage::ConnectionEstablished { player_number: 1 });
        server.push(&ServerMessage::GameState {
            state: playing_state(0, 0),
        });
        engine.tick(now, InputState::default());
        server.received();
        (engine, server)
    }

    #[test]
    fn test_clean_round() {
        let start = Instant::now();
        let (mut engine, server) = engine();
        server.set_auto_accept(true);
        engine.start().unwrap();

        server.push(&ServerMessage::ConnectionEstablished { player_number: 1 });
        server.push(&ServerMessage::GameStatusChanged {
            status: GameStatus::Menu,
            reason: None,
        });
        engine.tick(start, InputState::default());
        assert_eq!(engine.status(), GameStatus::Menu);

        engine.request(Intent::StartGame).unwrap();
        assert!(server.received().contains(&ClientMessage::StartGame));

        server.push(&ServerMessage::GameStatusChanged {
            status: GameStatus::Playing,
            reason: None,
        });
        server.push(&ServerMessage::GameState {
            state: playing_state(0, 0),
        });
        engine.tick(start + FRAME, InputState::default());
        assert_eq!(engine.status(), GameStatus::Playing);

        let mut scored = playing_state(1, 0);
        scored.ball.x = 400.0;
        scored.ball.y = 300.0;
        scored.ball.dx = 0.0;
        scored.ball.dy = 0.0;
        server.push(&ServerMessage::GameState {
            state: scored.clone(),
        });
        engine.tick(start + FRAME * 2, InputState::default());

        assert_eq!(engine.state().left_paddle.score, 1);
        assert_eq!(engine.state().ball.x, 400.0);
        assert_eq!(engine.state().ball.y, 300.0);
        assert!(engine.trail().len() <= 1);
        assert_eq!(engine.overlay(start + FRAME * 2), Overlay::None);
    }

    #[test]
    fn test_input_moves_paddle_and_reports() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        let before = engine.state().left_paddle.y;

        let down = InputState {
            up: false,
            down: true,
        };
        engine.tick(start + FRAME, down);

        assert!(engine.state().left_paddle.y > before);
        let reports: Vec<ClientMessage> = server
            .received()
            .into_iter()
            .filter(|m| matches!(m, ClientMessage::PaddleMove { .. }))
            .collect();
        assert_eq!(
            reports,
            vec![ClientMessage::PaddleMove {
                position: engine.state().left_paddle.y
            }]
        );
    }

    #[test]
    fn test_predictor_idle_outside_play() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        server.push(&ServerMessage::GameStatusChanged {
            status: GameStatus::Paused,
            reason: None,
        });
        engine.tick(start + FRAME, InputState::default());
        let before = engine.state().left_paddle.y;

        engine.tick(
            start + FRAME * 2,
            InputState {
                up: false,
                down: true,
            },
        );

        assert_eq!(engine.state().left_paddle.y, before);
        assert!(server.received().is_empty());
    }

    #[test]
    fn test_invalid_intent_sends_nothing() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);

        let result = engine.request(Intent::NextMatch);

        assert!(matches!(result, Err(IntentError::NotAvailable { .. })));
        assert!(server.received().is_empty());
    }

    #[test]
    fn test_timeout_is_terminal() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        server.set_auto_accept(false);

        server.drop_connection(CLOSE_ABNORMAL, "network down");
        engine.tick(start, InputState::default());
        assert!(matches!(
            engine.overlay(start),
            Overlay::Reconnecting { .. }
        ));

        let mut now = start;
        while now < start + Duration::from_secs(10) {
            now += FRAME;
            if server.has_pending_open() {
                server.refuse("connection refused");
            }
            engine.tick(now, InputState::default());
            if now < start + Duration::from_millis(9_750) {
                assert!(!engine.is_failed(), "failed early at {:?}", now - start);
            }
        }

        assert!(engine.is_failed());
        assert!(!engine.timers_active());
        assert!(matches!(engine.overlay(now), Overlay::Failed { .. }));
        assert!(server.open_attempts() >= 4);

        let attempts = server.open_attempts();
        engine.tick(now + Duration::from_secs(30), InputState::default());
        assert_eq!(server.open_attempts(), attempts);
    }

    #[test]
    fn test_recovers_before_deadline() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        server.set_auto_accept(false);

        server.drop_connection(CLOSE_ABNORMAL, "blip");
        engine.tick(start, InputState::default());

        let mut now = start;
        for _ in 0..10 {
            now += FRAME;
            engine.tick(now, InputState::default());
        }
        assert!(server.has_pending_open());
        server.accept();
        server.push(&ServerMessage::ConnectionEstablished { player_number: 1 });
        server.push(&ServerMessage::GameState {
            state: playing_state(2, 1),
        });
        now += FRAME;
        engine.tick(now, InputState::default());

        assert_eq!(engine.overlay(now), Overlay::None);
        assert_eq!(engine.state().scores(), (2, 1));
        assert!(engine.connection().connected);
        assert!(!engine.is_failed());
    }

    #[test]
    fn test_force_disconnect_fails_without_reconnect() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);

        server.push(&ServerMessage::ForceDisconnect {
            reason: "opened elsewhere".to_string(),
        });
        engine.tick(start + FRAME, InputState::default());

        assert_eq!(
            engine.overlay(start + FRAME),
            Overlay::Failed {
                reason: "opened elsewhere".to_string()
            }
        );
        assert!(!engine.timers_active());
        assert_eq!(server.open_attempts(), 1);
    }

    #[test]
    fn test_game_completed_grace_disconnect() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);

        let mut final_state = playing_state(5, 3);
        final_state.status = GameStatus::GameOver;
        server.push(&ServerMessage::GameCompleted { final_state });
        engine.tick(start + FRAME, InputState::default());

        assert_eq!(engine.status(), GameStatus::GameOver);
        assert_eq!(engine.state().scores(), (5, 3));
        assert!(server.is_open());

        engine.tick(start + FRAME + Duration::from_millis(2_900), InputState::default());
        assert!(server.is_open());

        engine.tick(start + FRAME + Duration::from_secs(3), InputState::default());
        assert!(!server.is_open());
        assert_eq!(server.close_codes(), vec![CLOSE_NORMAL]);
        assert!(!engine.is_failed());
        assert_eq!(engine.overlay(start + Duration::from_secs(4)), Overlay::None);
    }

    #[test]
    fn test_peer_disconnect_overlay() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);

        server.push(&ServerMessage::PlayerStatus {
            player: 2,
            connected: false,
        });
        engine.tick(start + FRAME, InputState::default());
        assert_eq!(engine.overlay(start + FRAME), Overlay::PeerDisconnected);

        server.push(&ServerMessage::PlayerStatus {
            player: 2,
            connected: true,
        });
        engine.tick(start + FRAME * 2, InputState::default());
        assert_eq!(engine.overlay(start + FRAME * 2), Overlay::None);
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        assert!(engine.timers_active());

        engine.shutdown();

        assert!(!engine.timers_active());
        assert_eq!(server.close_codes(), vec![CLOSE_NORMAL]);
    }

    #[test]
    fn test_retry_after_failure() {
        let start = Instant::now();
        let (mut engine, server) = joined(start);
        server.push(&ServerMessage::ForceDisconnect {
            reason: "kicked".to_string(),
        });
        engine.tick(start + FRAME, InputState::default());
        assert!(engine.is_failed());

        engine.retry().unwrap();
        engine.tick(start + FRAME * 2, InputState::default());

        assert!(!engine.is_failed());
        assert!(engine.connection().connected);
        assert_eq!(engine.status(), GameStatus::Waiting);
        assert_eq!(server.open_attempts(), 2);
    }
}
