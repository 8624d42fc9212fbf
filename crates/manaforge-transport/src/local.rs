//! In-process transport: peers are simulated through a handle.
//!
//! Used by the server's own tests and handy for bots or replay tools that
//! want to talk to a game server without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{ConnectionId, PeerReceiver, PeerSender, Transport, TransportError, TransportEvent};

/// Server side of an in-memory transport.
pub struct LocalTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Peer side of an in-memory transport. Cheap to clone.
#[derive(Clone)]
pub struct LocalTransportHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    next_id: Arc<AtomicU64>,
}

impl LocalTransport {
    /// Creates a transport and the handle that feeds it.
    pub fn new() -> (Self, LocalTransportHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { events: rx },
            LocalTransportHandle {
                events: tx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
        )
    }
}

impl Transport for LocalTransport {
    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        self.events.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.events.close();
        Ok(())
    }
}

impl LocalTransportHandle {
    /// Simulates a peer connecting. Returns its id and the queue the server
    /// writes to.
    pub fn connect(&self) -> (ConnectionId, PeerReceiver) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (peer, rx) = PeerSender::channel();
        let _ = self.events.send(TransportEvent::Connected { id, peer });
        (id, rx)
    }

    /// Simulates `data` arriving from peer `id`.
    pub fn send(&self, id: ConnectionId, data: impl Into<Bytes>) {
        let _ = self.events.send(TransportEvent::Message {
            id,
            data: data.into(),
        });
    }

    /// Simulates peer `id` going away.
    pub fn disconnect(&self, id: ConnectionId) {
        let _ = self.events.send(TransportEvent::Disconnected { id });
    }
}
