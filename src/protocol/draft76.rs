//! The pre-standard hixie-76 handshake and its sentinel framing.
//!
//! Text frames are `0x00 <utf-8> 0xFF`; the closing handshake is `0xFF 0x00`.
//! There is no representation for binary data, ping or pong.

use bytes::{Buf, BytesMut};
use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{require_get, validate_header_value};
use crate::request::Request;

const FRAME_START: u8 = 0x00;
const FRAME_END: u8 = 0xFF;

/// Length of the key challenge that follows the request headers.
pub const CHALLENGE_LEN: usize = 8;

/// Derive the 32-bit number encoded in a `Sec-WebSocket-Key1/2` value.
///
/// The digits form a number which is divided by the count of spaces.
///
/// # Errors
///
/// `Error::InvalidHandshake` if the digits overflow 32 bits, the key contains
/// no spaces, or the number is not a multiple of the space count.
pub fn parse_key(key: &str) -> Result<u32> {
    let mut number: u32 = 0;
    let mut spaces: u32 = 0;
    for c in key.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = number
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .ok_or_else(|| Error::InvalidHandshake(format!("key number overflows: {key:?}")))?;
        } else if c == ' ' {
            spaces += 1;
        }
    }

    if spaces == 0 {
        return Err(Error::InvalidHandshake(format!("key contains no spaces: {key:?}")));
    }
    if number % spaces != 0 {
        return Err(Error::InvalidHandshake(format!(
            "key number {number} is not a multiple of {spaces} spaces"
        )));
    }
    Ok(number / spaces)
}

/// MD5(be32(key1) ++ be32(key2) ++ challenge).
///
/// # Errors
///
/// Any error from [`parse_key`].
pub fn challenge_response(key1: &str, key2: &str, challenge: &[u8; CHALLENGE_LEN]) -> Result<[u8; 16]> {
    let mut hasher = Md5::new();
    hasher.update(parse_key(key1)?.to_be_bytes());
    hasher.update(parse_key(key2)?.to_be_bytes());
    hasher.update(challenge);
    let mut answer = [0u8; 16];
    answer.copy_from_slice(&hasher.finalize());
    Ok(answer)
}

/// Build the `101 WebSocket Protocol Handshake` response, including the
/// 16-byte challenge answer.
///
/// # Errors
///
/// - `Error::InvalidHandshake` for a non-`GET` request, missing keys, a short
///   challenge or a bad key
/// - `Error::InvalidHeaderValue` if an echoed value contains CR or LF
pub fn handshake(request: &Request, sub_protocol: Option<&str>) -> Result<Vec<u8>> {
    require_get(request)?;
    let key1 = request
        .header("Sec-WebSocket-Key1")
        .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key1 header".into()))?;
    let key2 = request
        .header("Sec-WebSocket-Key2")
        .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key2 header".into()))?;
    let challenge: &[u8; CHALLENGE_LEN] = request
        .body()
        .get(..CHALLENGE_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::InvalidHandshake("missing 8-byte key challenge".into()))?;

    let answer = challenge_response(key1, key2, challenge)?;

    let origin = request.header("Origin").unwrap_or_default();
    let host = request.header("Host").unwrap_or_default();
    let location = format!("{}://{}{}", request.scheme(), host, request.path());
    validate_header_value("Sec-WebSocket-Origin", origin)?;
    validate_header_value("Sec-WebSocket-Location", &location)?;

    let mut response = Vec::with_capacity(192);
    response.extend_from_slice(b"HTTP/1.1 101 WebSocket Protocol Handshake\r\n");
    response.extend_from_slice(b"Upgrade: WebSocket\r\n");
    response.extend_from_slice(b"Connection: Upgrade\r\n");
    response.extend_from_slice(format!("Sec-WebSocket-Origin: {origin}\r\n").as_bytes());
    response.extend_from_slice(format!("Sec-WebSocket-Location: {location}\r\n").as_bytes());
    if let Some(proto) = sub_protocol {
        validate_header_value("Sec-WebSocket-Protocol", proto)?;
        response.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
    }
    response.extend_from_slice(b"\r\n");
    response.extend_from_slice(&answer);
    Ok(response)
}

#[must_use]
pub fn frame_text(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + 2);
    frame.push(FRAME_START);
    frame.extend_from_slice(text.as_bytes());
    frame.push(FRAME_END);
    frame
}

#[must_use]
pub fn frame_close() -> Vec<u8> {
    vec![FRAME_END, FRAME_START]
}

/// Streaming decoder for sentinel-delimited frames.
#[derive(Debug)]
pub struct Draft76Decoder {
    buffer: BytesMut,
    max_frame_size: usize,
    /// Body bytes of the pending frame already searched for the end marker.
    scanned: usize,
}

impl Draft76Decoder {
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
            scanned: 0,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next event, or `Ok(None)` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidFrameStart` if a frame does not begin with `0x00`
    /// - `Error::FrameTooLarge` once a frame outgrows the limit
    /// - `Error::InvalidUtf8` for a non-UTF-8 frame body
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        let Some(&first) = self.buffer.first() else {
            return Ok(None);
        };

        if first == FRAME_END {
            return match self.buffer.get(1) {
                None => Ok(None),
                Some(&FRAME_START) => {
                    self.buffer.advance(2);
                    Ok(Some(Message::Close(None)))
                }
                Some(_) => Err(Error::InvalidFrameStart(first)),
            };
        }
        if first != FRAME_START {
            return Err(Error::InvalidFrameStart(first));
        }

        let body = &self.buffer[1..];
        let Some(found) = body[self.scanned..].iter().position(|&b| b == FRAME_END) else {
            self.scanned = body.len();
            self.check_size(body.len())?;
            return Ok(None);
        };
        let len = self.scanned + found;
        self.scanned = 0;
        self.check_size(len)?;

        let text = std::str::from_utf8(&body[..len])?.to_owned();
        self.buffer.advance(len + 2);
        Ok(Some(Message::Text(text)))
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: len as u64,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}
