use crate::state::PlayerSide;

/// Connection facts shown to the player. Only the connection manager writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionState {
    pub connected: bool,
    pub connecting: bool,
    pub player_number: Option<PlayerSide>,
    /// Smoothed round-trip time in milliseconds.
    pub ping_ms: f32,
    /// Connect attempts since the last successful open.
    pub reconnect_attempt: u32,
}

impl ConnectionState {
    pub fn is_idle(&self) -> bool {
        !self.connected && !self.connecting
    }

    pub fn mark_connecting(&mut self) {
        self.connecting = true;
        self.reconnect_attempt += 1;
    }

    pub fn mark_open(&mut self) {
        self.connected = true;
        self.connecting = false;
        self.reconnect_attempt = 0;
    }

    pub fn mark_closed(&mut self) {
        self.connected = false;
        self.connecting = false;
    }

    /// Folds a round-trip sample into `ping_ms` with an exponential moving average.
    pub fn record_rtt(&mut self, sample_ms: f32, alpha: f32) {
        if self.ping_ms <= 0.0 {
            self.ping_ms = sample_ms;
        } else {
            self.ping_ms += alpha * (sample_ms - self.ping_ms);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no credential supplied")]
    Missing,
    #[error("credential is blank")]
    Blank,
}

/// Opaque session credential passed when the channel opens.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Blank);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn from_optional(raw: Option<&str>) -> Result<Self, CredentialError> {
        match raw {
            Some(raw) => Self::parse(raw),
            None => Err(CredentialError::Missing),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthToken(<{} bytes>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_rejected() {
        assert_eq!(AuthToken::parse("   "), Err(CredentialError::Blank));
        assert_eq!(AuthToken::from_optional(None), Err(CredentialError::Missing));
        assert_eq!(AuthToken::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AuthToken::parse("secret").unwrap();
        assert!(!format!("{:?}", token).contains("secret"));
    }

    #[test]
    fn test_open_resets_attempts() {
        let mut state = ConnectionState::default();
        state.mark_connecting();
        state.mark_closed();
        state.mark_connecting();
        assert_eq!(state.reconnect_attempt, 2);

        state.mark_open();
        assert!(state.connected);
        assert_eq!(state.reconnect_attempt, 0);
    }

    #[test]
    fn test_rtt_average() {
        let mut state = ConnectionState::default();
        state.record_rtt(100.0, 0.2);
        assert_eq!(state.ping_ms, 100.0);

        state.record_rtt(200.0, 0.2);
        assert!((state.ping_ms - 120.0).abs() < 0.001);
    }
}
