//! # Manaforge
//!
//! Session rendezvous and message routing for game servers in a split
//! account-server / game-server backend.
//!
//! The account server authenticates a player, picks a single-use token and
//! hands `(token, identity)` to the game server through a
//! [`HandoffHandle`]. The player's client connects to the game server and
//! presents the token in a CONNECT message. Whichever side arrives first
//! waits; the second completes the match, binds the connection to the
//! identity and answers `CONNECT_RESPONSE(OK)`. From then on the
//! [`MessageDispatcher`] routes the client's gameplay opcodes to the
//! identity, and chat goes to everyone nearby.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use manaforge::prelude::*;
//!
//! # async fn start() -> Result<(), ManaforgeError> {
//! let (server, handoffs) = GameServerBuilder::<Character>::new()
//!     .bind("0.0.0.0:9601")
//!     .build(SquareRadius(10))
//!     .await?;
//! tokio::spawn(server.run());
//!
//! // Later, when the account server hands a player over:
//! let token = Token::generate();
//! let hero = Character::new(1, "hero", MapId(1), Position::new(20, 20));
//! handoffs.register_handoff(token, hero)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod handoff;
mod server;

pub use config::GameServerConfig;
pub use dispatcher::{Dispatch, MessageDispatcher};
pub use error::ManaforgeError;
pub use handoff::HandoffHandle;
pub use server::{GameServer, GameServerBuilder, TickReport};

/// Everything needed to run a game server and write an identity type.
pub mod prelude {
    pub use crate::{
        Dispatch, GameServer, GameServerBuilder, GameServerConfig, HandoffHandle,
        ManaforgeError, MessageDispatcher, TickReport,
    };

    pub use manaforge_protocol::{
        ClientMessage, ItemId, MessageIn, MessageOut, Opcode, ProtocolError, ServerMessage,
        Status, TOKEN_LEN,
    };
    pub use manaforge_session::{
        ConnectOutcome, ExpiryHook, HandoffOutcome, RendezvousConfig, SessionError,
        SessionRendezvous, Token,
    };
    pub use manaforge_tick::{
        ManualTickHandle, ManualTicks, TickConfig, TickInfo, TickPolicy, TickScheduler,
        TickSource,
    };
    pub use manaforge_transport::{
        ConnectionId, LocalTransport, LocalTransportHandle, PeerReceiver, PeerSender,
        Transport, TransportError, TransportEvent, WebSocketTransport,
    };
    pub use manaforge_world::{
        BroadcastRouter, Character, ConnectionRegistry, Identity, IdentityId, MapId,
        Position, Proximity, SquareRadius, WorldError,
    };
}
