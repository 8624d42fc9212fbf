//! Binary wire protocol for Manaforge.
//!
//! - **Codec** ([`MessageIn`], [`MessageOut`]): opcode framing plus
//!   big-endian field readers and writers.
//! - **Types** ([`Opcode`], [`ClientMessage`], [`ServerMessage`], ...): the
//!   messages a game client and the game server exchange.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Dispatcher (handlers)
//! ```
//!
//! Nothing here knows about connections or identities.

mod codec;
mod error;
mod types;

pub use codec::{MAX_STRING_LEN, MessageIn, MessageOut};
pub use error::ProtocolError;
pub use types::{ClientMessage, ItemId, Opcode, ServerMessage, Status, TOKEN_LEN};
