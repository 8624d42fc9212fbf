//! Error types for the protocol layer.
//!
//! Each crate in Manaforge defines its own error enum. A `ProtocolError`
//! always means the bytes did not match the shape their opcode promises;
//! it never says anything about who sent them.

/// Errors that can occur while reading a binary message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message is shorter than the 2-byte opcode.
    #[error("message of {0} bytes has no opcode")]
    MissingOpcode(usize),

    /// A field needed more bytes than the payload had left.
    #[error("truncated payload: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    /// A string field did not hold UTF-8.
    #[error("string field is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    /// The bytes parsed, but violate a protocol rule (wrong direction,
    /// unknown status byte, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
