//! Per-message routing: the CONNECT gate for unbound connections and the
//! gameplay handlers for bound ones.
//!
//! ```text
//!              ┌────────── CONNECT(token) ──► SessionRendezvous
//!   Unbound ───┤
//!              └────────── anything else ───► dropped, no reply
//!
//!              ┌── SAY ──────► BroadcastRouter::say_around
//!              ├── PICKUP ───► add_item            ──► PICKUP_RESPONSE(OK)
//!   Bound ─────┼── USE_ITEM ─► has_item            ──► USE_RESPONSE(OK/FAILURE)
//!              ├── WALK ─────► set_destination
//!              ├── EQUIP ────► equip               ──► EQUIP_RESPONSE(OK/FAILURE)
//!              └── other ────► warn                ──► INVALID
//! ```
//!
//! Unbound connections never get a reply from here: a client that has not
//! proven who it is learns nothing about the protocol.

use bytes::Bytes;
use manaforge_protocol::{ClientMessage, MessageIn, Opcode, ServerMessage, Status};
use manaforge_session::{ConnectOutcome, SessionRendezvous, Token};
use manaforge_transport::ConnectionId;
use manaforge_world::{BroadcastRouter, ConnectionRegistry, Identity, Position, Proximity};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Ignored without a reply: unknown connection, noise before binding,
    /// or an unreadable payload.
    Dropped,
    /// A CONNECT from an unbound connection, handed to the rendezvous.
    Rendezvous(ConnectOutcome),
    /// A gameplay message ran its handler.
    Handled { opcode: Opcode, responded: bool },
    /// Not valid for a bound connection; INVALID was sent back.
    Rejected(Opcode),
}

/// Routes decoded messages to handlers. Stateless apart from the proximity
/// predicate inside its router.
pub struct MessageDispatcher<P> {
    router: BroadcastRouter<P>,
}

impl<P: Proximity> MessageDispatcher<P> {
    pub fn new(proximity: P) -> Self {
        Self {
            router: BroadcastRouter::new(proximity),
        }
    }

    pub fn router(&self) -> &BroadcastRouter<P> {
        &self.router
    }

    /// Handles one raw message from `conn_id`. Sends at most one response.
    pub fn dispatch<I: Identity>(
        &self,
        registry: &mut ConnectionRegistry<I>,
        rendezvous: &mut SessionRendezvous<I>,
        conn_id: ConnectionId,
        data: Bytes,
    ) -> Dispatch {
        let Some(conn) = registry.get(conn_id) else {
            tracing::debug!(%conn_id, "message from unknown connection");
            return Dispatch::Dropped;
        };
        let bound = conn.is_bound();

        let decoded = MessageIn::parse(data)
            .and_then(|mut msg| ClientMessage::decode(&mut msg).map(|m| (msg.opcode(), m)));
        let (opcode, message) = match decoded {
            Ok(ok) => ok,
            Err(err) => {
                tracing::debug!(%conn_id, bound, error = %err, "dropping unreadable message");
                return Dispatch::Dropped;
            }
        };

        if !bound {
            return Self::dispatch_unbound(registry, rendezvous, conn_id, message);
        }

        match self.handle_bound(registry, conn_id, message) {
            Some(ServerMessage::Invalid) => {
                tracing::warn!(%conn_id, %opcode, "invalid message from bound connection");
                registry.send(conn_id, &ServerMessage::Invalid);
                Dispatch::Rejected(opcode)
            }
            Some(response) => {
                registry.send(conn_id, &response);
                Dispatch::Handled {
                    opcode,
                    responded: true,
                }
            }
            None => Dispatch::Handled {
                opcode,
                responded: false,
            },
        }
    }

    fn dispatch_unbound<I: Identity>(
        registry: &mut ConnectionRegistry<I>,
        rendezvous: &mut SessionRendezvous<I>,
        conn_id: ConnectionId,
        message: ClientMessage,
    ) -> Dispatch {
        let ClientMessage::Connect { token } = message else {
            tracing::debug!(
                %conn_id,
                opcode = %message.opcode(),
                "unbound connection sent non-CONNECT"
            );
            return Dispatch::Dropped;
        };
        let token = match Token::new(token) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!(%conn_id, error = %err, "CONNECT with unusable token");
                return Dispatch::Dropped;
            }
        };
        match rendezvous.attempt_connect(registry, conn_id, token) {
            Ok(outcome) => Dispatch::Rendezvous(outcome),
            Err(err) => {
                tracing::warn!(%conn_id, error = %err, "connect attempt failed");
                Dispatch::Dropped
            }
        }
    }

    /// Runs the gameplay handler for `message`. `None` means no reply.
    fn handle_bound<I: Identity>(
        &self,
        registry: &mut ConnectionRegistry<I>,
        conn_id: ConnectionId,
        message: ClientMessage,
    ) -> Option<ServerMessage> {
        if let ClientMessage::Say { text } = &message {
            let speaker = registry.get(conn_id)?.identity()?;
            self.router.say_around(registry, speaker, text);
            return None;
        }

        let identity = registry.get_mut(conn_id)?.identity_mut()?;
        match message {
            ClientMessage::Pickup { item } => {
                identity.add_item(item);
                Some(ServerMessage::PickupResponse(Status::Ok))
            }
            ClientMessage::UseItem { item } => {
                Some(ServerMessage::UseResponse(Status::from_bool(identity.has_item(item))))
            }
            ClientMessage::Walk { x, y } => {
                identity.set_destination(Position::new(x, y));
                None
            }
            ClientMessage::Equip { item, slot } => Some(ServerMessage::EquipResponse(
                Status::from_bool(identity.equip(item, slot)),
            )),
            ClientMessage::Connect { .. } | ClientMessage::Unknown(_) => {
                Some(ServerMessage::Invalid)
            }
            ClientMessage::Say { .. } => None,
        }
    }
}
