//! Decoded WebSocket events and close codes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// Abnormal closure (1006). Local signal for an unexpected disconnect, never sent.
    Abnormal,
    /// Invalid payload (1007). Endpoint received a message with invalid data (e.g., non-UTF-8 in text).
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Server encountered an unexpected condition.
    InternalError,
    /// Any other code (3000-4999 for applications, 1012-1014 for registered codes).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may appear in a Close frame (RFC 6455 Section 7.4.1).
    ///
    /// Valid codes are 1000-1003, 1007-1014 and 3000-4999.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode the payload of a received Close frame.
    ///
    /// An empty payload is a code-less close (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a 1-byte payload
    /// - `Error::InvalidCloseCode` when the code may not be sent on the wire
    /// - `Error::InvalidUtf8` when the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::ProtocolViolation(
                "Close frame payload of 1 byte".into(),
            )),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }
}

/// A logical event decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
    /// A ping frame (control frame, payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong frame (control frame, payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close frame (control frame, may include status code and reason).
    Close(Option<CloseFrame>),
}
