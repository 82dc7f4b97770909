//! Frame opcodes (RFC 6455 Section 5.2).

use crate::error::{Error, Result};

/// The 4-bit opcode carried in the first byte of every Hybi13 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented message (0x0).
    Continuation = 0x0,
    /// UTF-8 text (0x1).
    Text = 0x1,
    /// Arbitrary bytes (0x2).
    Binary = 0x2,
    /// Close handshake (0x8).
    Close = 0x8,
    /// Ping (0x9). Answered with a Pong carrying the same payload.
    Ping = 0x9,
    /// Pong (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Decode the low nibble of a frame's first byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for 0x3-0x7 and 0xB-0xF.
    pub const fn from_nibble(nibble: u8) -> Result<Self> {
        match nibble & 0x0F {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::ReservedOpcode(other)),
        }
    }

    /// Raw wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping and Pong are control frames.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        !self.is_control()
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        if value > 0x0F {
            return Err(Error::ReservedOpcode(value));
        }
        Self::from_nibble(value)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        f.write_str(name)
    }
}
