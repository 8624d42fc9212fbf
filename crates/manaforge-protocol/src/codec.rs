//! Reading and writing framed binary messages.
//!
//! The transport already delimits messages, so a message here is just:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ opcode (u16) │ payload: fields in opcode-specific order │
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! There is no schema on the wire. Both sides must agree on field order per
//! opcode, which is what [`ClientMessage`](crate::ClientMessage) and
//! [`ServerMessage`](crate::ServerMessage) encode.
//!
//! All integers are big-endian (network order). Strings come in two shapes:
//! variable-length (u16 byte count, then UTF-8) and fixed-length (exactly N
//! bytes, NUL-padded).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Opcode, ProtocolError};

/// Longest string a variable-length field can carry.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// An inbound message: the opcode plus a cursor over the payload.
///
/// Every `read_*` call consumes bytes; reading past the end is an error
/// rather than a silent zero.
#[derive(Debug, Clone)]
pub struct MessageIn {
    opcode: Opcode,
    payload: Bytes,
}

impl MessageIn {
    /// Splits the opcode off a raw message.
    ///
    /// # Errors
    /// [`ProtocolError::MissingOpcode`] if `data` is shorter than 2 bytes.
    pub fn parse(mut data: Bytes) -> Result<Self, ProtocolError> {
        if data.len() < 2 {
            return Err(ProtocolError::MissingOpcode(data.len()));
        }
        let opcode = Opcode(data.get_u16());
        Ok(Self {
            opcode,
            payload: data,
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Payload bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.payload.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = self.payload.remaining();
        if remaining < needed {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.payload.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.payload.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.payload.get_u32())
    }

    /// Reads a u16-length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u16()? as usize;
        self.ensure(len)?;
        let raw = self.payload.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(ProtocolError::InvalidUtf8)
    }

    /// Reads exactly `len` bytes as a string, dropping trailing NUL padding.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String, ProtocolError> {
        self.ensure(len)?;
        let raw = self.payload.split_to(len);
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        String::from_utf8(raw[..end].to_vec()).map_err(ProtocolError::InvalidUtf8)
    }
}

/// An outbound message under construction.
///
/// The opcode is written on creation, so a `MessageOut` is never empty.
/// Writers return `&mut Self` to allow chaining.
#[derive(Debug, Clone)]
pub struct MessageOut {
    buf: BytesMut,
}

impl MessageOut {
    pub fn new(opcode: Opcode) -> Self {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u16(opcode.0);
        Self { buf }
    }

    pub fn opcode(&self) -> Opcode {
        Opcode(u16::from_be_bytes([self.buf[0], self.buf[1]]))
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// Writes a u16-length-prefixed string. Strings longer than
    /// [`MAX_STRING_LEN`] bytes are cut at the last char boundary that fits.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let value = truncate_to_boundary(value, MAX_STRING_LEN);
        self.buf.put_u16(value.len() as u16);
        self.buf.put_slice(value.as_bytes());
        self
    }

    /// Writes exactly `len` bytes: `value` cut or NUL-padded to fit.
    pub fn write_fixed_string(&mut self, value: &str, len: usize) -> &mut Self {
        let value = truncate_to_boundary(value, len);
        self.buf.put_slice(value.as_bytes());
        self.buf.put_bytes(0, len - value.len());
        self
    }

    /// Total size including the opcode.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always `false`: the opcode is part of the message.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Size of everything after the opcode.
    pub fn payload_len(&self) -> usize {
        self.buf.len() - 2
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Freezes the message. The result is cheap to clone, so one encoded
    /// message can be queued to many peers.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

fn truncate_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
