//! Error types for the world layer.

use manaforge_transport::ConnectionId;

use crate::IdentityId;

/// Errors from [`ConnectionRegistry`](crate::ConnectionRegistry) operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// Binding is one-way: a bound connection stays bound until it closes.
    #[error("connection {0} is already bound to {1}")]
    AlreadyBound(ConnectionId, IdentityId),
}
