//! Error types for the session layer.

use manaforge_world::WorldError;

/// Errors from token handling and the rendezvous.
///
/// Unmatched or duplicate connect attempts are not errors; they are normal
/// outcomes reported through [`ConnectOutcome`](crate::ConnectOutcome).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token string cannot be carried by a CONNECT message.
    #[error("invalid hand-off token: {0}")]
    InvalidToken(String),

    /// Binding the matched connection failed in the registry.
    #[error(transparent)]
    World(#[from] WorldError),
}
