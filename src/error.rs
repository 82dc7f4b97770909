//! Error types for the WebSocket protocol engine.
//!
//! Every failure a connection can run into is an [`Error`]. The variants fall
//! into four families that decide how a connection is torn down:
//!
//! - **handshake** errors close the socket without a close frame,
//! - **protocol** errors close with the status code from [`Error::close_code`],
//! - **transport** errors are local abnormal closures,
//! - the availability probe is not a failure at all.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a WebSocket connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or incomplete opening handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake data exceeds configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual handshake size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Header value would break the response framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// No protocol variant matches the request.
    #[error("Unsupported WebSocket version: {}", .0.as_deref().unwrap_or("(none)"))]
    UnsupportedVersion(Option<String>),

    /// A health-check client requested the availability path.
    #[error("Availability probe received")]
    AvailabilityProbe,

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text frame or close reason.
    #[error("Invalid UTF-8 in frame payload")]
    InvalidUtf8,

    /// Draft-76 frame did not start with the 0x00 sentinel.
    #[error("Invalid frame start byte: {0:#04x}")]
    InvalidFrameStart(u8),

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Close frame carries a code that may not appear on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(String),

    /// Connection has already been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A handler callback panicked.
    #[error("Application error: {0}")]
    Application(String),

    /// Invalid server configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS negotiation or setup failed.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// The close status code a connection sends when it fails with this error.
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Error::UnsupportedVersion(_) => CloseCode::UnsupportedData,
            Error::InvalidUtf8 | Error::InvalidFrameStart(_) => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. } | Error::MessageTooLarge { .. } => {
                CloseCode::MessageTooBig
            }
            Error::ProtocolViolation(_)
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnmaskedClientFrame
            | Error::ReservedBitsSet
            | Error::InvalidCloseCode(_) => CloseCode::ProtocolError,
            Error::Io(_) | Error::ConnectionClosed => CloseCode::Abnormal,
            Error::AvailabilityProbe => CloseCode::Normal,
            Error::InvalidHandshake(_)
            | Error::HandshakeTooLarge { .. }
            | Error::InvalidHeaderValue { .. }
            | Error::Application(_)
            | Error::Config(_)
            | Error::Tls(_) => CloseCode::InternalError,
        }
    }

    /// Returns `true` for failures of the opening handshake.
    #[must_use]
    pub const fn is_handshake(&self) -> bool {
        matches!(
            self,
            Error::InvalidHandshake(_)
                | Error::HandshakeTooLarge { .. }
                | Error::InvalidHeaderValue { .. }
        )
    }

    /// Returns `true` for wire-format violations, which always carry a close code.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedVersion(_)
                | Error::ProtocolViolation(_)
                | Error::InvalidUtf8
                | Error::InvalidFrameStart(_)
                | Error::FrameTooLarge { .. }
                | Error::MessageTooLarge { .. }
                | Error::ReservedOpcode(_)
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::UnmaskedClientFrame
                | Error::ReservedBitsSet
                | Error::InvalidCloseCode(_)
        )
    }

    /// Returns `true` for failures of the underlying transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Tls(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8
    }
}
