//! Live transport: the JSON control protocol and its WebSocket sessions.
//!
//! Each live connection is represented in the publisher by a
//! [`ConnectionHandle`], a bounded channel of serialized frames. The session
//! task owns the socket and drains that channel, so a slow client never
//! blocks the publisher.

mod connection;
mod handler;
mod protocol;
mod websocket;

pub use connection::{ConnectionHandle, ConnectionId, SendOutcome, DEFAULT_CONNECTION_CHANNEL_CAPACITY};
pub use handler::handle_client_message;
pub use protocol::{ClientMessage, ServerMessage};
pub use websocket::{serve, serve_connection, TransportConfig, TransportError, DEFAULT_BIND_ADDRESS};
