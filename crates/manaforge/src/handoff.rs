//! The account server's way in.

use manaforge_session::Token;
use tokio::sync::mpsc;

use crate::ManaforgeError;

pub(crate) struct HandoffCommand<I> {
    pub(crate) token: Token,
    pub(crate) identity: I,
}

/// Sends hand-offs to a running [`GameServer`](crate::GameServer).
///
/// Whatever carries hand-offs between the account server and this process
/// (RPC, message bus, a shared process) ends by calling
/// [`register_handoff`](Self::register_handoff) here. Cheap to clone and
/// usable from any task.
pub struct HandoffHandle<I> {
    tx: mpsc::UnboundedSender<HandoffCommand<I>>,
}

impl<I> Clone for HandoffHandle<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<I: Send + 'static> HandoffHandle<I> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<HandoffCommand<I>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Tells the game server that `identity` may log in with `token`.
    ///
    /// Returns once the hand-off is queued; the server applies it on its
    /// next loop iteration.
    ///
    /// # Errors
    /// [`ManaforgeError::ServerStopped`] if the server loop is gone.
    pub fn register_handoff(&self, token: Token, identity: I) -> Result<(), ManaforgeError> {
        self.tx
            .send(HandoffCommand { token, identity })
            .map_err(|_| ManaforgeError::ServerStopped)
    }

    /// `true` once the server loop has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_after_server_gone_fails() {
        let (handle, rx) = HandoffHandle::<u32>::channel();
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.register_handoff(Token::generate(), 1),
            Err(ManaforgeError::ServerStopped)
        ));
    }

    #[test]
    fn test_clones_feed_the_same_queue() {
        let (handle, mut rx) = HandoffHandle::<u32>::channel();
        handle.clone().register_handoff(Token::generate(), 1).unwrap();
        handle.register_handoff(Token::generate(), 2).unwrap();

        assert_eq!(rx.try_recv().unwrap().identity, 1);
        assert_eq!(rx.try_recv().unwrap().identity, 2);
    }
}
