/// Normal closure (RFC 6455 §7.4.1).
pub const CLOSE_NORMAL: u16 = 1000;
/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Everything a transport reports back to its owner.
///
/// Transports queue these from their I/O callbacks; the owner drains them
/// once per frame with [`Transport::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,
    #[error("transport is already open or opening")]
    AlreadyOpen,
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
}

/// An ordered, reliable, bidirectional text channel.
pub trait Transport {
    /// Starts opening the channel. Completion is reported as [`TransportEvent::Opened`].
    fn open(&mut self, url: &str) -> Result<(), TransportError>;

    fn send(&mut self, text: String) -> Result<(), TransportError>;

    fn close(&mut self, code: u16, reason: &str);

    fn poll_events(&mut self) -> Vec<TransportEvent>;
}
