//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each accepted socket gets a reader task (frames in → events out) and a
//! writer task (peer queue in → frames out). Neither touches server state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, PeerReceiver, PeerSender, Transport, TransportError, TransportEvent};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A WebSocket-based [`Transport`] listening on a TCP address.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    accept_task: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds the listener and starts accepting peers in the background.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, events) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(listener, tx));

        Ok(Self {
            local_addr,
            events,
            accept_task,
        })
    }

    /// The address the listener is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for WebSocketTransport {
    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        self.events.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        // Live peers keep delivering until they close; only accepting stops.
        self.accept_task.abort();
        tracing::info!(local_addr = %self.local_addr, "WebSocket transport stopped accepting");
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, events: EventSender) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(serve_peer(stream, addr, events.clone()));
            }
            Err(e) => {
                let err = TransportError::Accept(e);
                tracing::warn!(error = %err, "accept failed");
                // Usually fd exhaustion; back off instead of spinning.
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve_peer(stream: TcpStream, addr: SocketAddr, events: EventSender) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            let err = TransportError::Handshake(e.to_string());
            tracing::debug!(%addr, error = %err, "dropping peer");
            return;
        }
    };

    let id = ConnectionId::new(
        NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
    );
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    let (peer, outbound) = PeerSender::channel();
    if events.send(TransportEvent::Connected { id, peer }).is_err() {
        // Transport dropped while the upgrade was in flight.
        return;
    }

    let (sink, mut stream) = ws.split();
    let writer = tokio::spawn(write_loop(id, sink, outbound));

    while let Some(frame) = stream.next().await {
        let data = match frame {
            Ok(Message::Binary(data)) => Bytes::from(data),
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/raw frame
            Err(e) => {
                let err = TransportError::Receive(id, e.to_string());
                tracing::debug!(error = %err, "closing peer");
                break;
            }
        };
        if events.send(TransportEvent::Message { id, data }).is_err() {
            break;
        }
    }

    let _ = events.send(TransportEvent::Disconnected { id });
    // The writer exits on its own once the server drops the peer sender,
    // but there is nobody left to write to.
    writer.abort();
    tracing::debug!(%id, %addr, "WebSocket connection closed");
}

async fn write_loop<S>(id: ConnectionId, mut sink: S, mut outbound: PeerReceiver)
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(data) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Binary(data)).await {
            let err = TransportError::Send(id, e.to_string());
            tracing::debug!(error = %err, "stopping writer");
            return;
        }
    }
    let _ = sink.close().await;
}
