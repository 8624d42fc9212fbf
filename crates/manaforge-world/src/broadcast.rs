//! Proximity multicast and identity-addressed delivery.

use manaforge_protocol::ServerMessage;

use crate::{ConnectionRegistry, Identity, IdentityId, Proximity};

/// Routes server messages to bound connections.
///
/// Holds the proximity predicate; the registry is passed per call so the
/// router never owns connection state.
pub struct BroadcastRouter<P> {
    proximity: P,
}

impl<P: Proximity> BroadcastRouter<P> {
    pub fn new(proximity: P) -> Self {
        Self { proximity }
    }

    pub fn proximity(&self) -> &P {
        &self.proximity
    }

    /// Sends one chat line from `speaker` to every bound connection on the
    /// same map that the predicate says is around them. The speaker's own
    /// connection is one of those when the predicate holds for a tile and
    /// itself.
    ///
    /// Returns how many connections the message was queued to.
    pub fn say_around<I: Identity>(
        &self,
        registry: &ConnectionRegistry<I>,
        speaker: &I,
        text: &str,
    ) -> usize {
        let map = speaker.map_id();
        let origin = speaker.position();

        // Encode once; every recipient gets a refcounted clone.
        let data = ServerMessage::Say {
            speaker: speaker.name().to_string(),
            text: text.to_string(),
        }
        .encode()
        .into_bytes();

        let mut delivered = 0;
        for (conn, listener) in registry.bound() {
            if listener.map_id() != map {
                continue;
            }
            if !self.proximity.are_around(origin, listener.position()) {
                continue;
            }
            if conn.send_bytes(data.clone()) {
                delivered += 1;
            }
        }

        tracing::trace!(speaker = %speaker.id(), delivered, "say_around");
        delivered
    }

    /// Sends `msg` to whichever connection is bound to `identity`. Does
    /// nothing if that identity is not online. Returns whether a send
    /// happened.
    pub fn send_to<I: Identity>(
        &self,
        registry: &ConnectionRegistry<I>,
        identity: IdentityId,
        msg: &ServerMessage,
    ) -> bool {
        match registry.connection_for(identity) {
            Some(conn_id) => registry.send(conn_id, msg),
            None => {
                tracing::trace!(%identity, "send_to: identity not online");
                false
            }
        }
    }
}
