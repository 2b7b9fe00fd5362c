pub mod net;
pub mod snapshot;
pub mod state;

pub use net::{
    AuthToken, CLOSE_ABNORMAL, CLOSE_NORMAL, ClientMessage, ConnectionState, CredentialError,
    LoopbackServer, LoopbackTransport, MAX_MESSAGE_SIZE, ProtocolError, ServerMessage, Transport,
    TransportError, TransportEvent, decode_client_message, decode_server_message,
    encode_client_message, encode_server_message, loopback_pair,
};
pub use snapshot::{DEFAULT_SNAPSHOT_CAPACITY, ServerSnapshot, SnapshotBuffer};
pub use state::{Ball, GameState, GameStatus, MatchWins, Paddle, PlayerSide};
