//! Opcodes and the typed messages built on top of [`MessageIn`] and
//! [`MessageOut`].
//!
//! The server mostly works with these enums. Raw readers and writers only
//! show up here, where each variant's field order is pinned down once.

use std::fmt;

use crate::{MessageIn, MessageOut, ProtocolError};

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The 16-bit tag at the front of every message.
///
/// Kept open (a newtype, not an enum) so that opcodes this build does not
/// know about can still be carried, logged and answered with
/// [`Opcode::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u16);

impl Opcode {
    /// C→S: present a hand-off token. Payload: 32-byte fixed string.
    pub const CONNECT: Opcode = Opcode(0x0050);
    /// S→C: result of a successful CONNECT. Payload: status byte.
    pub const CONNECT_RESPONSE: Opcode = Opcode(0x0051);
    pub const PICKUP: Opcode = Opcode(0x0110);
    pub const PICKUP_RESPONSE: Opcode = Opcode(0x0111);
    pub const USE_ITEM: Opcode = Opcode(0x0120);
    pub const USE_RESPONSE: Opcode = Opcode(0x0121);
    pub const EQUIP: Opcode = Opcode(0x0130);
    pub const EQUIP_RESPONSE: Opcode = Opcode(0x0131);
    /// C→S: request a move. Payload: u16 x, u16 y. No response.
    pub const WALK: Opcode = Opcode(0x0260);
    /// C→S: chat line. Payload: string. No direct response.
    pub const SAY: Opcode = Opcode(0x02A0);
    /// S→C: someone nearby said something. Payload: name, text.
    pub const SAY_BROADCAST: Opcode = Opcode(0x02A1);
    /// S→C: the previous message made no sense in this state. Empty payload.
    pub const INVALID: Opcode = Opcode(0x7FFF);
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Small payload types
// ---------------------------------------------------------------------------

/// Length of the hand-off token carried by CONNECT.
pub const TOKEN_LEN: usize = 32;

/// Result byte carried by every `*_RESPONSE` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Failure = 1,
}

impl Status {
    pub fn from_bool(ok: bool) -> Self {
        if ok { Status::Ok } else { Status::Failure }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Failure),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown status byte {other}"
            ))),
        }
    }
}

/// An item type id. What it means is up to the world's item database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientMessage — client → server
// ---------------------------------------------------------------------------

/// Everything a game client can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Connect { token: String },
    Say { text: String },
    Pickup { item: ItemId },
    UseItem { item: ItemId },
    Walk { x: u16, y: u16 },
    Equip { item: ItemId, slot: u8 },
    /// An opcode with no client-side meaning. Decoding never fails on the
    /// opcode alone; the dispatcher decides what to do with it.
    Unknown(Opcode),
}

impl ClientMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            ClientMessage::Connect { .. } => Opcode::CONNECT,
            ClientMessage::Say { .. } => Opcode::SAY,
            ClientMessage::Pickup { .. } => Opcode::PICKUP,
            ClientMessage::UseItem { .. } => Opcode::USE_ITEM,
            ClientMessage::Walk { .. } => Opcode::WALK,
            ClientMessage::Equip { .. } => Opcode::EQUIP,
            ClientMessage::Unknown(op) => *op,
        }
    }

    /// Reads the payload for `msg`'s opcode. Trailing bytes are ignored.
    ///
    /// # Errors
    /// [`ProtocolError::Truncated`] or [`ProtocolError::InvalidUtf8`] when a
    /// known opcode's fields cannot be read.
    pub fn decode(msg: &mut MessageIn) -> Result<Self, ProtocolError> {
        let decoded = match msg.opcode() {
            Opcode::CONNECT => ClientMessage::Connect {
                token: msg.read_fixed_string(TOKEN_LEN)?,
            },
            Opcode::SAY => ClientMessage::Say {
                text: msg.read_string()?,
            },
            Opcode::PICKUP => ClientMessage::Pickup {
                item: ItemId(msg.read_u32()?),
            },
            Opcode::USE_ITEM => ClientMessage::UseItem {
                item: ItemId(msg.read_u32()?),
            },
            Opcode::WALK => {
                let x = msg.read_u16()?;
                let y = msg.read_u16()?;
                ClientMessage::Walk { x, y }
            }
            Opcode::EQUIP => {
                let item = ItemId(msg.read_u32()?);
                let slot = msg.read_u8()?;
                ClientMessage::Equip { item, slot }
            }
            other => ClientMessage::Unknown(other),
        };
        Ok(decoded)
    }

    /// Builds the wire form. Clients and tests use this; the server only
    /// decodes.
    pub fn encode(&self) -> MessageOut {
        let mut out = MessageOut::new(self.opcode());
        match self {
            ClientMessage::Connect { token } => {
                out.write_fixed_string(token, TOKEN_LEN);
            }
            ClientMessage::Say { text } => {
                out.write_string(text);
            }
            ClientMessage::Pickup { item } | ClientMessage::UseItem { item } => {
                out.write_u32(item.0);
            }
            ClientMessage::Walk { x, y } => {
                out.write_u16(*x).write_u16(*y);
            }
            ClientMessage::Equip { item, slot } => {
                out.write_u32(item.0).write_u8(*slot);
            }
            ClientMessage::Unknown(_) => {}
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ServerMessage — server → client
// ---------------------------------------------------------------------------

/// Everything the game server sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ConnectResponse(Status),
    PickupResponse(Status),
    UseResponse(Status),
    EquipResponse(Status),
    Say { speaker: String, text: String },
    Invalid,
}

impl ServerMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            ServerMessage::ConnectResponse(_) => Opcode::CONNECT_RESPONSE,
            ServerMessage::PickupResponse(_) => Opcode::PICKUP_RESPONSE,
            ServerMessage::UseResponse(_) => Opcode::USE_RESPONSE,
            ServerMessage::EquipResponse(_) => Opcode::EQUIP_RESPONSE,
            ServerMessage::Say { .. } => Opcode::SAY_BROADCAST,
            ServerMessage::Invalid => Opcode::INVALID,
        }
    }

    pub fn encode(&self) -> MessageOut {
        let mut out = MessageOut::new(self.opcode());
        match self {
            ServerMessage::ConnectResponse(status)
            | ServerMessage::PickupResponse(status)
            | ServerMessage::UseResponse(status)
            | ServerMessage::EquipResponse(status) => {
                out.write_u8(status.as_u8());
            }
            ServerMessage::Say { speaker, text } => {
                out.write_string(speaker).write_string(text);
            }
            ServerMessage::Invalid => {}
        }
        out
    }

    /// Parses a server message; used by clients and tests.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] for opcodes the server never sends,
    /// or the usual field errors.
    pub fn decode(msg: &mut MessageIn) -> Result<Self, ProtocolError> {
        let decoded = match msg.opcode() {
            Opcode::CONNECT_RESPONSE => {
                ServerMessage::ConnectResponse(Status::from_u8(msg.read_u8()?)?)
            }
            Opcode::PICKUP_RESPONSE => {
                ServerMessage::PickupResponse(Status::from_u8(msg.read_u8()?)?)
            }
            Opcode::USE_RESPONSE => {
                ServerMessage::UseResponse(Status::from_u8(msg.read_u8()?)?)
            }
            Opcode::EQUIP_RESPONSE => {
                ServerMessage::EquipResponse(Status::from_u8(msg.read_u8()?)?)
            }
            Opcode::SAY_BROADCAST => {
                let speaker = msg.read_string()?;
                let text = msg.read_string()?;
                ServerMessage::Say { speaker, text }
            }
            Opcode::INVALID => ServerMessage::Invalid,
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "opcode {other} is not a server message"
                )));
            }
        };
        Ok(decoded)
    }
}
