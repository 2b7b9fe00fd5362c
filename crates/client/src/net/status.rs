use rally::{ClientMessage, GameStatus};

/// Control requests a player can make. The server decides whether they take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    StartGame,
    TogglePause,
    NextMatch,
    RestartGame,
}

impl Intent {
    pub fn message(&self) -> ClientMessage {
        match self {
            Intent::StartGame => ClientMessage::StartGame,
            Intent::TogglePause => ClientMessage::TogglePause,
            Intent::NextMatch => ClientMessage::NextMatch,
            Intent::RestartGame => ClientMessage::RestartGame,
        }
    }

    pub fn allowed_in(&self, status: GameStatus) -> bool {
        use GameStatus::*;

        match self {
            Intent::StartGame => status == Menu,
            Intent::TogglePause => matches!(status, Playing | Paused),
            Intent::NextMatch => status == MatchOver,
            Intent::RestartGame => matches!(status, Menu | Playing | Paused | MatchOver),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("{intent:?} is not available while {status}")]
    NotAvailable { intent: Intent, status: GameStatus },
    #[error("the game is over")]
    GameOver,
}

/// Tracks the match status. Only the server moves it; local intents are
/// validated here and turned into control messages.
#[derive(Debug, Clone, Default)]
pub struct StatusMachine {
    status: GameStatus,
    reason: Option<String>,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn request(&self, intent: Intent) -> Result<ClientMessage, IntentError> {
        if self.status.is_terminal() {
            return Err(IntentError::GameOver);
        }
        if !intent.allowed_in(self.status) {
            return Err(IntentError::NotAvailable {
                intent,
                status: self.status,
            });
        }
        Ok(intent.message())
    }

    /// Applies a server-reported status. Returns true if the status changed.
    pub fn apply_server(&mut self, status: GameStatus, reason: Option<String>) -> bool {
        if self.status.is_terminal() && status != self.status {
            log::warn!("Ignoring status {} after game over", status);
            return false;
        }
        if status == self.status {
            if reason.is_some() {
                self.reason = reason;
            }
            return false;
        }

        log::info!("Game status {} -> {}", self.status, status);
        self.status = status;
        self.reason = reason;
        true
    }

    pub fn complete(&mut self) {
        self.apply_server(GameStatus::GameOver, None);
    }

    /// Back to `waiting` for a fresh session after a failure.
    pub fn reset(&mut self) {
        self.status = GameStatus::Waiting;
        self.reason = None;
    }
}
