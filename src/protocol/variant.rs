//! Protocol generation selection and per-variant dispatch.

use log::debug;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::draft76::{self, Draft76Decoder};
use crate::protocol::hybi13::{self, Hybi13Decoder};
use crate::request::Request;

/// Path health checkers request instead of upgrading.
pub const AVAILABILITY_PROBE_PATH: &str = "/pingAvailabilityTest";

/// The protocol generation bound to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// RFC 6455, announced as version 7, 8 or 13.
    Hybi13,
    /// hixie-76, recognised by `Sec-WebSocket-Key1`.
    Draft76,
}

/// Choose the variant for `request`.
///
/// `Sec-WebSocket-Version` wins over `Sec-WebSocket-Draft`, which wins over
/// the presence of `Sec-WebSocket-Key1`.
///
/// # Errors
///
/// - `Error::UnsupportedVersion` if no variant matches
/// - `Error::AvailabilityProbe` for a plain request to the probe path
pub fn select_variant(request: &Request) -> Result<ProtocolVariant> {
    let announced = request
        .header("Sec-WebSocket-Version")
        .or_else(|| request.header("Sec-WebSocket-Draft"));

    if let Some(version) = announced {
        return match version.trim() {
            "7" | "8" | "13" => Ok(ProtocolVariant::Hybi13),
            other => Err(Error::UnsupportedVersion(Some(other.to_string()))),
        };
    }
    if request.has_header("Sec-WebSocket-Key1") {
        return Ok(ProtocolVariant::Draft76);
    }
    if request.path() == AVAILABILITY_PROBE_PATH {
        return Err(Error::AvailabilityProbe);
    }
    Err(Error::UnsupportedVersion(None))
}

/// First subprotocol the client offered, if any.
#[must_use]
pub fn negotiate_sub_protocol(request: &Request) -> Option<String> {
    request
        .header("Sec-WebSocket-Protocol")?
        .split(',')
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

impl ProtocolVariant {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVariant::Hybi13 => "hybi-13",
            ProtocolVariant::Draft76 => "draft-76",
        }
    }

    /// Response bytes completing the opening handshake.
    ///
    /// # Errors
    ///
    /// Handshake errors from the variant's negotiator.
    pub fn handshake(self, request: &Request, sub_protocol: Option<&str>) -> Result<Vec<u8>> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::handshake(request, sub_protocol),
            ProtocolVariant::Draft76 => draft76::handshake(request, sub_protocol),
        }
    }

    /// How many leading body bytes the handshake itself consumes.
    ///
    /// Anything after them is already frame data.
    #[must_use]
    pub const fn handshake_body_len(self) -> usize {
        match self {
            ProtocolVariant::Hybi13 => 0,
            ProtocolVariant::Draft76 => draft76::CHALLENGE_LEN,
        }
    }

    #[must_use]
    pub fn frame_text(self, text: &str) -> Vec<u8> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::frame_text(text),
            ProtocolVariant::Draft76 => draft76::frame_text(text),
        }
    }

    /// Empty for draft-76, which cannot carry binary data.
    #[must_use]
    pub fn frame_binary(self, data: &[u8]) -> Vec<u8> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::frame_binary(data),
            ProtocolVariant::Draft76 => Vec::new(),
        }
    }

    #[must_use]
    pub fn frame_close(self, code: CloseCode) -> Vec<u8> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::frame_close(code),
            ProtocolVariant::Draft76 => draft76::frame_close(),
        }
    }

    #[must_use]
    pub fn frame_ping(self, data: &[u8]) -> Vec<u8> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::frame_ping(data),
            ProtocolVariant::Draft76 => Vec::new(),
        }
    }

    #[must_use]
    pub fn frame_pong(self, data: &[u8]) -> Vec<u8> {
        match self {
            ProtocolVariant::Hybi13 => hybi13::frame_pong(data),
            ProtocolVariant::Draft76 => Vec::new(),
        }
    }

    /// A fresh decoder for this variant.
    #[must_use]
    pub fn decoder(self, limits: &Limits) -> Decoder {
        debug!("creating {} decoder", self.name());
        match self {
            ProtocolVariant::Hybi13 => Decoder::Hybi13(Hybi13Decoder::new(limits.clone())),
            ProtocolVariant::Draft76 => {
                Decoder::Draft76(Draft76Decoder::new(limits.max_frame_size))
            }
        }
    }
}

impl std::fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Incoming byte decoder for the bound variant.
#[derive(Debug)]
pub enum Decoder {
    Hybi13(Hybi13Decoder),
    Draft76(Draft76Decoder),
}

impl Decoder {
    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        match self {
            Decoder::Hybi13(d) => d.extend(data),
            Decoder::Draft76(d) => d.extend(data),
        }
    }

    /// Next complete event, or `Ok(None)` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Protocol errors carrying the close code to send.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        match self {
            Decoder::Hybi13(d) => d.next_message(),
            Decoder::Draft76(d) => d.next_message(),
        }
    }
}
