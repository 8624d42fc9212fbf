//! The game server's view of who is connected and where they stand.
//!
//! # Key types
//!
//! - [`Identity`]: capabilities a world character exposes to the server
//! - [`ConnectionRegistry`]: live connections, each unbound or bound to an
//!   identity, plus an identity → connection index
//! - [`Proximity`]: the injected "are these tiles near" predicate
//! - [`BroadcastRouter`]: chat multicast to nearby players and addressed
//!   delivery by identity
//! - [`Character`]: a ready-made in-memory identity

mod broadcast;
mod error;
mod identity;
mod proximity;
mod registry;

pub use broadcast::BroadcastRouter;
pub use error::WorldError;
pub use identity::{Character, EQUIPMENT_SLOTS, Identity, IdentityId, MapId, Position};
pub use proximity::{Proximity, SquareRadius};
pub use registry::{Binding, Connection, ConnectionRegistry};
