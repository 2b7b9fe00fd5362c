mod connection;
mod loopback;
mod protocol;
mod transport;

pub use connection::{AuthToken, ConnectionState, CredentialError};
pub use loopback::{LoopbackServer, LoopbackTransport, loopback_pair};
pub use protocol::{
    ClientMessage, MAX_MESSAGE_SIZE, ProtocolError, ServerMessage, decode_client_message,
    decode_server_message, encode_client_message, encode_server_message,
};
pub use transport::{CLOSE_ABNORMAL, CLOSE_NORMAL, Transport, TransportError, TransportEvent};
