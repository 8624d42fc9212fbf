//! Hand-off tokens.

use std::fmt;

use manaforge_protocol::TOKEN_LEN;
use rand::Rng;

use crate::SessionError;

/// Single-use secret that ties an account-server login to a game connection.
///
/// At most [`TOKEN_LEN`] bytes, non-empty, no NUL bytes (NUL is padding on
/// the wire). `Display` and `Debug` only show a prefix so tokens do not end
/// up whole in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wraps an existing token string.
    ///
    /// # Errors
    /// [`SessionError::InvalidToken`] if the value is empty, longer than
    /// [`TOKEN_LEN`] bytes, or contains NUL.
    pub fn new(value: impl Into<String>) -> Result<Self, SessionError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SessionError::InvalidToken("empty".into()));
        }
        if value.len() > TOKEN_LEN {
            return Err(SessionError::InvalidToken(format!(
                "{} bytes, at most {TOKEN_LEN} allowed",
                value.len()
            )));
        }
        if value.contains('\0') {
            return Err(SessionError::InvalidToken("contains NUL".into()));
        }
        Ok(Self(value))
    }

    /// A fresh random token: 16 random bytes as 32 lowercase hex chars.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    fn prefix(&self) -> &str {
        let mut end = self.0.len().min(8);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        &self.0[..end]
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..", self.prefix())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}..)", self.prefix())
    }
}
