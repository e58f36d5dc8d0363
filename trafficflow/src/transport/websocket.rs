//! WebSocket server sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ConnectionHandle, DEFAULT_CONNECTION_CHANNEL_CAPACITY};
use super::handler::handle_client_message;
use super::protocol::ServerMessage;
use crate::events::EventPublisher;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8765";

/// Listener settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub bind_address: String,
    /// Frames buffered per connection before new ones are dropped.
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            channel_capacity: DEFAULT_CONNECTION_CHANNEL_CAPACITY,
        }
    }
}

impl TransportConfig {
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Accepts connections until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    publisher: Arc<EventPublisher>,
    config: TransportConfig,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    let local = listener.local_addr()?;
    info!(address = %local, "Transport listening");

    loop {
        let (stream, peer) = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            },
        };

        let publisher = Arc::clone(&publisher);
        let config = config.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, peer, publisher, &config, shutdown).await {
                debug!(peer = %peer, error = %e, "Session ended with error");
            }
        });
    }

    info!("Transport stopped");
    Ok(())
}

/// Runs one client session: handshake, welcome frame, then control messages
/// and event frames until either side closes.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    publisher: Arc<EventPublisher>,
    config: &TransportConfig,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut incoming) = socket.split();

    let (handle, mut frames) = ConnectionHandle::channel(config.channel_capacity);
    let id = publisher.register_connection(handle);
    debug!(connection = %id, peer = %peer, "Client connected");

    let welcome = ServerMessage::Welcome {
        connection_id: id,
        timestamp: Utc::now(),
    };

    let result = async {
        sink.send(Message::Text(welcome.to_json())).await?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                frame = frames.recv() => match frame {
                    Some(frame) => sink.send(Message::Text(frame)).await?,
                    None => break,
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&publisher, id, &text, Utc::now());
                        sink.send(Message::Text(reply.to_json())).await?;
                    }
                    Some(Ok(Message::Ping(payload))) => sink.send(Message::Pong(payload)).await?,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(TransportError::from(e)),
                },
            }
        }
        Ok::<(), TransportError>(())
    }
    .await;

    publisher.remove_connection(id);
    debug!(connection = %id, "Client disconnected");
    result
}
