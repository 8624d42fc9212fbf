//! Unified error type for Manaforge.

use std::path::PathBuf;

use manaforge_protocol::ProtocolError;
use manaforge_session::SessionError;
use manaforge_transport::TransportError;
use manaforge_world::WorldError;

/// Top-level error wrapping every crate's error.
///
/// Per-message problems never surface here; the dispatcher logs and drops
/// them. What does reach a caller is setup failure (bind, config) or talking
/// to a server that has stopped.
#[derive(Debug, thiserror::Error)]
pub enum ManaforgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    World(#[from] WorldError),

    /// A hand-off was sent after the server loop ended.
    #[error("game server is not running")]
    ServerStopped,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("cannot read config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
