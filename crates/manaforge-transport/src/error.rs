use crate::ConnectionId;

/// Errors that can occur in the transport layer.
///
/// Only `Bind` and `Shutdown` ever reach the server loop. The per-peer
/// variants are produced inside reader/writer tasks and end up in logs,
/// because a failing peer just becomes a disconnect event.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer connected but never completed the WebSocket upgrade.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// Reading from a peer failed; the peer is treated as disconnected.
    #[error("receive failed on {0}: {1}")]
    Receive(ConnectionId, String),

    /// Writing to a peer failed; queued bytes are dropped.
    #[error("send failed on {0}: {1}")]
    Send(ConnectionId, String),

    /// The transport was shut down and has no more events.
    #[error("transport shut down")]
    Shutdown,
}
