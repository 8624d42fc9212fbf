//! Transport abstraction layer for Manaforge.
//!
//! The game server runs a single control task. Transports therefore do not
//! hand out connection objects to be driven by per-connection tasks; they
//! surface a stream of [`TransportEvent`]s (accept, message, disconnect) and
//! give the server a [`PeerSender`] per connection for outbound bytes.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
mod local;
mod peer;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use local::{LocalTransport, LocalTransportHandle};
pub use peer::{PeerReceiver, PeerSender};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;
use std::future::Future;

use bytes::Bytes;

/// Opaque identifier for a connection.
///
/// Ids are handed out in accept order, so ordering by id is ordering by
/// connection age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that happened to a peer, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// A peer was accepted. Outbound bytes for it go through `peer`.
    Connected { id: ConnectionId, peer: PeerSender },

    /// A complete message arrived from a peer.
    Message { id: ConnectionId, data: Bytes },

    /// The peer is gone. No further events follow for this id.
    Disconnected { id: ConnectionId },
}

impl TransportEvent {
    /// The connection this event concerns.
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Self::Connected { id, .. }
            | Self::Message { id, .. }
            | Self::Disconnected { id } => *id,
        }
    }
}

/// A source of peer events.
///
/// Events for a single connection are delivered in order; events of
/// different connections are interleaved in arrival order.
pub trait Transport: Send + 'static {
    /// Waits for the next peer event.
    ///
    /// Returns `Err(TransportError::Shutdown)` once the transport has been
    /// shut down and every pending event was drained.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<TransportEvent, TransportError>> + Send;

    /// Stops accepting new peers.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
