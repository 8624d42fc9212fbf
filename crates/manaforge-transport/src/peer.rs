//! Outbound byte channels to a single peer.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Sending half of a peer's outbound queue.
///
/// Sending never blocks: the bytes are queued and the transport's writer
/// task flushes them. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PeerSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl PeerSender {
    /// Creates a connected sender/receiver pair.
    pub fn channel() -> (PeerSender, PeerReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerSender { tx }, PeerReceiver { rx })
    }

    /// Queues `data` for the peer. Returns `false` if the peer's writer is
    /// gone, in which case the bytes are dropped.
    pub fn send(&self, data: Bytes) -> bool {
        self.tx.send(data).is_ok()
    }

    /// `true` once the receiving half was dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a peer's outbound queue. Owned by the writer task (or
/// by a test acting as the remote peer).
#[derive(Debug)]
pub struct PeerReceiver {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl PeerReceiver {
    /// Waits for the next queued message. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Takes the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Takes everything queued right now.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(data) = self.rx.try_recv() {
            out.push(data);
        }
        out
    }

    /// Closes the queue so further sends fail.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_then_drain_preserves_order() {
        let (tx, mut rx) = PeerSender::channel();
        assert!(tx.send(Bytes::from_static(b"a")));
        assert!(tx.send(Bytes::from_static(b"b")));

        let got = rx.drain();
        assert_eq!(got, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_send_after_receiver_dropped_reports_failure() {
        let (tx, rx) = PeerSender::channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.send(Bytes::from_static(b"lost")));
    }

    #[test]
    fn test_close_marks_sender_closed() {
        let (tx, mut rx) = PeerSender::channel();
        rx.close();
        assert!(tx.is_closed());
    }
}
