use std::collections::VecDeque;
use std::time::{Duration, Instant};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use rally::{
    AuthToken, CLOSE_ABNORMAL, CLOSE_NORMAL, ClientMessage, ConnectionState, CredentialError,
    GameState, GameStatus, PlayerSide, ProtocolError, ServerMessage, Transport, TransportError,
    TransportEvent, decode_server_message, encode_client_message,
};

use super::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("cannot connect without a credential: {0}")]
    Credential(#[from] CredentialError),
    #[error("failed to open channel: {0}")]
    Transport(#[from] TransportError),
}

/// Inbound traffic after demultiplexing, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Opened,
    /// The channel dropped without us asking for it.
    Lost { reason: String },
    Identity(PlayerSide),
    Snapshot(GameState),
    StatusChanged {
        status: GameStatus,
        reason: Option<String>,
    },
    PlayerStatus {
        side: PlayerSide,
        connected: bool,
    },
    /// The server ended the session. The channel is already closed.
    ForceDisconnect { reason: String },
    GameCompleted(GameState),
}

/// Fixed-rate tick that runs only while the channel is open.
#[derive(Debug, Clone)]
struct DispatchTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl DispatchTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    fn stop(&mut self) {
        self.next = None;
    }

    fn fire(&mut self, now: Instant) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if now < next {
            return false;
        }

        let following = next + self.interval;
        self.next = Some(if following <= now {
            now + self.interval
        } else {
            following
        });
        true
    }
}

/// Owns the channel to the server.
///
/// Outbound messages sent while the channel is down wait in a bounded FIFO
/// queue and go out in order as soon as it opens. The manager never
/// reconnects on its own; callers decide when to call
/// [`ConnectionManager::connect`] again.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    server_url: String,
    token: Option<String>,
    state: ConnectionState,
    outbound: VecDeque<String>,
    queue_capacity: usize,
    dispatch: DispatchTimer,
    ping_interval: Duration,
    rtt_smoothing: f32,
    last_ping: Option<Instant>,
    epoch: Instant,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            server_url: config.server_url.clone(),
            token: config.token.clone(),
            state: ConnectionState::default(),
            outbound: VecDeque::new(),
            queue_capacity: config.outbound_queue_capacity.max(1),
            dispatch: DispatchTimer::new(config.min_send_interval()),
            ping_interval: config.ping_interval,
            rtt_smoothing: config.rtt_smoothing,
            last_ping: None,
            epoch: Instant::now(),
        }
    }

    /// Opens the channel. Does nothing while already open or opening.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        if !self.state.is_idle() {
            log::debug!("Connect ignored, channel already open or opening");
            return Ok(());
        }

        let token = AuthToken::from_optional(self.token.as_deref())?;
        let url = session_url(&self.server_url, &token);

        self.state.mark_connecting();
        log::info!(
            "Connecting to {} (attempt {})",
            self.server_url,
            self.state.reconnect_attempt
        );

        if let Err(e) = self.transport.open(&url) {
            self.state.mark_closed();
            return Err(e.into());
        }
        Ok(())
    }

    /// Closes with a normal-closure code and stops periodic work.
    pub fn disconnect(&mut self) {
        if !self.state.is_idle() {
            log::info!("Disconnecting");
            self.transport.close(CLOSE_NORMAL, "client disconnect");
        }
        self.state.mark_closed();
        self.dispatch.stop();
        self.last_ping = None;
        self.outbound.clear();
    }

    pub fn send(&mut self, message: &ClientMessage) -> Result<(), ProtocolError> {
        let text = encode_client_message(message)?;

        if self.state.connected {
            match self.transport.send(text.clone()) {
                Ok(()) => {
                    log::trace!("Sent {}", message.kind());
                    return Ok(());
                }
                // The channel is going away. Keep the message for the next open.
                Err(e) => log::warn!("Send of {} failed: {}", message.kind(), e),
            }
        }

        self.enqueue(text);
        Ok(())
    }

    fn enqueue(&mut self, text: String) {
        if self.outbound.len() >= self.queue_capacity {
            if let Some(dropped) = self.outbound.pop_front() {
                log::warn!(
                    "Outbound queue full ({}), dropping oldest message ({} bytes)",
                    self.queue_capacity,
                    dropped.len()
                );
            }
        }
        self.outbound.push_back(text);
    }

    fn flush_queue(&mut self) {
        if !self.outbound.is_empty() {
            log::debug!("Flushing {} queued messages", self.outbound.len());
        }
        while let Some(text) = self.outbound.pop_front() {
            if let Err(e) = self.transport.send(text.clone()) {
                log::warn!("Flush interrupted: {}", e);
                self.outbound.push_front(text);
                break;
            }
        }
    }

    /// Drains transport events and turns them into [`Inbound`] items.
    pub fn poll(&mut self, now: Instant) -> Vec<Inbound> {
        let mut inbound = Vec::new();

        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Opened => {
                    if !self.state.connecting {
                        log::debug!("Open reported for a channel we no longer want");
                        continue;
                    }
                    log::info!("Connected to {}", self.server_url);
                    self.state.mark_open();
                    self.state.player_number = None;
                    self.flush_queue();
                    self.dispatch.start(now);
                    self.last_ping = None;
                    inbound.push(Inbound::Opened);
                }
                TransportEvent::Message(text) => {
                    if let Some(item) = self.handle_text(&text, now) {
                        inbound.push(item);
                    }
                }
                TransportEvent::Closed { code, reason } => {
                    if self.state.is_idle() {
                        log::debug!("Ignoring close {} on an idle channel", code);
                        continue;
                    }
                    log::warn!("Channel closed ({}): {}", code, reason);
                    self.lose_channel();
                    inbound.push(Inbound::Lost { reason });
                }
                TransportEvent::Error(error) => {
                    if self.state.is_idle() {
                        log::debug!("Ignoring error on an idle channel: {}", error);
                        continue;
                    }
                    log::warn!("Channel error: {}", error);
                    self.transport.close(CLOSE_ABNORMAL, "transport error");
                    self.lose_channel();
                    inbound.push(Inbound::Lost { reason: error });
                }
            }
        }

        inbound
    }

    fn lose_channel(&mut self) {
        self.state.mark_closed();
        self.dispatch.stop();
        self.last_ping = None;
    }

    fn handle_text(&mut self, text: &str, now: Instant) -> Option<Inbound> {
        let message = match decode_server_message(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping malformed server message: {}", e);
                return None;
            }
        };
        log::trace!("Received {}", message.kind());

        match message {
            ServerMessage::ConnectionEstablished { player_number } => {
                let Some(side) = PlayerSide::from_number(player_number) else {
                    log::warn!("Server assigned unknown player number {}", player_number);
                    return None;
                };
                log::info!("Playing as player {}", player_number);
                self.state.player_number = Some(side);
                Some(Inbound::Identity(side))
            }
            ServerMessage::GameState { state } => {
                if self.state.player_number.is_none() {
                    log::debug!("Dropping snapshot received before identity");
                    return None;
                }
                Some(Inbound::Snapshot(state))
            }
            ServerMessage::GameStatusChanged { status, reason } => {
                Some(Inbound::StatusChanged { status, reason })
            }
            ServerMessage::PlayerStatus { player, connected } => {
                let Some(side) = PlayerSide::from_number(player) else {
                    log::warn!("Status for unknown player {}", player);
                    return None;
                };
                Some(Inbound::PlayerStatus { side, connected })
            }
            ServerMessage::ForceDisconnect { reason } => {
                log::warn!("Server ended the session: {}", reason);
                self.disconnect();
                Some(Inbound::ForceDisconnect { reason })
            }
            ServerMessage::GameCompleted { final_state } => {
                Some(Inbound::GameCompleted(final_state))
            }
            ServerMessage::Pong { timestamp } => {
                let sent_ms = timestamp as u128;
                let now_ms = now.saturating_duration_since(self.epoch).as_millis();
                if sent_ms <= now_ms {
                    let rtt = (now_ms - sent_ms) as f32;
                    self.state.record_rtt(rtt, self.rtt_smoothing);
                    log::debug!("RTT {:.0} ms (smoothed {:.0} ms)", rtt, self.state.ping_ms);
                }
                None
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error: {}", message);
                None
            }
        }
    }

    /// Sends a ping when one is due.
    pub fn tick(&mut self, now: Instant) {
        if !self.state.connected {
            return;
        }
        if self
            .last_ping
            .is_some_and(|at| now.saturating_duration_since(at) < self.ping_interval)
        {
            return;
        }

        self.last_ping = Some(now);
        let timestamp = now.saturating_duration_since(self.epoch).as_millis() as u64;
        if let Err(e) = self.send(&ClientMessage::Ping { timestamp }) {
            log::warn!("Failed to send ping: {}", e);
        }
    }

    /// True once per dispatch interval while the channel is open.
    pub fn dispatch_due(&mut self, now: Instant) -> bool {
        self.dispatch.fire(now)
    }

    pub fn dispatch_active(&self) -> bool {
        self.dispatch.next.is_some()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn queued(&self) -> usize {
        self.outbound.len()
    }
}

/// Appends the credential as a percent-encoded `token` query parameter.
pub fn session_url(base: &str, token: &AuthToken) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}token={}",
        base,
        separator,
        utf8_percent_encode(token.as_str(), NON_ALPHANUMERIC)
    )
}
