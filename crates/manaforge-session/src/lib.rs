//! Session establishment for Manaforge game servers.
//!
//! Players authenticate with a separate account server. That server picks a
//! [`Token`], tells the player which game server to connect to, and hands
//! the token plus the player's world identity to this game server. The
//! player then connects and presents the token. [`SessionRendezvous`] pairs
//! the two up no matter which arrives first.
//!
//! ```text
//! Account server ──hand-off──► SessionRendezvous ◄──CONNECT── Game client
//!                                     │
//!                                     ▼
//!                         ConnectionRegistry::bind
//! ```

mod config;
mod error;
mod rendezvous;
mod token;

pub use config::{DEFAULT_HANDOFF_TTL_TICKS, RendezvousConfig};
pub use error::SessionError;
pub use rendezvous::{ConnectOutcome, ExpiryHook, HandoffOutcome, SessionRendezvous};
pub use token::Token;
