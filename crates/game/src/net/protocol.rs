use serde::{Deserialize, Serialize};

use crate::state::{GameState, GameStatus};

/// Upper bound on a single encoded message.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Control messages sent from the client. Encoded as `{"type": ..., ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PaddleMove { position: f32 },
    StartGame,
    TogglePause,
    NextMatch,
    RestartGame,
    Ping { timestamp: u64 },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::PaddleMove { .. } => "paddle_move",
            ClientMessage::StartGame => "start_game",
            ClientMessage::TogglePause => "toggle_pause",
            ClientMessage::NextMatch => "next_match",
            ClientMessage::RestartGame => "restart_game",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

/// Messages pushed by the authoritative server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        player_number: u8,
    },
    GameState {
        state: GameState,
    },
    GameStatusChanged {
        status: GameStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    PlayerStatus {
        player: u8,
        connected: bool,
    },
    ForceDisconnect {
        #[serde(default)]
        reason: String,
    },
    GameCompleted {
        final_state: GameState,
    },
    Pong {
        timestamp: u64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ConnectionEstablished { .. } => "connection_established",
            ServerMessage::GameState { .. } => "game_state",
            ServerMessage::GameStatusChanged { .. } => "game_status_changed",
            ServerMessage::PlayerStatus { .. } => "player_status",
            ServerMessage::ForceDisconnect { .. } => "force_disconnect",
            ServerMessage::GameCompleted { .. } => "game_completed",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("message too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    TooLarge(usize),
    #[error("serialization failed: {0}")]
    Serialize(serde_json::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(serde_json::Error),
}

fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(message).map_err(ProtocolError::Serialize)?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(text.len()));
    }
    Ok(text)
}

fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(ProtocolError::Deserialize)
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, ProtocolError> {
    encode(message)
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    decode(text)
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String, ProtocolError> {
    encode(message)
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    decode(text)
}
