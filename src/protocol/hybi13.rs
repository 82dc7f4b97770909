//! RFC 6455 (hybi-07 through hybi-13) handshake and framing.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{Buf, BytesMut};
use sha1::{Digest, Sha1};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::assembler::MessageAssembler;
use crate::protocol::validation::FrameValidator;
use crate::protocol::{Frame, OpCode, require_get, validate_header_value};
use crate::request::Request;

/// The GUID appended to the client key before hashing (RFC 6455 Section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsgate::protocol::hybi13::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build the `101 Switching Protocols` response for `request`.
///
/// # Errors
///
/// - `Error::InvalidHandshake` for a non-`GET` request, or if
///   `Sec-WebSocket-Key` is missing or does not decode to 16 bytes
/// - `Error::InvalidHeaderValue` if the echoed subprotocol contains CR or LF
pub fn handshake(request: &Request, sub_protocol: Option<&str>) -> Result<Vec<u8>> {
    require_get(request)?;
    let key = request
        .header("Sec-WebSocket-Key")
        .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key header".into()))?;

    match BASE64.decode(key) {
        Ok(decoded) if decoded.len() == 16 => {}
        Ok(decoded) => {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Key must decode to 16 bytes, got {}",
                decoded.len()
            )));
        }
        Err(_) => {
            return Err(Error::InvalidHandshake(
                "Sec-WebSocket-Key is not valid base64".into(),
            ));
        }
    }

    let mut response = Vec::with_capacity(160);
    response.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    response.extend_from_slice(b"Upgrade: websocket\r\n");
    response.extend_from_slice(b"Connection: Upgrade\r\n");
    if let Some(proto) = sub_protocol {
        validate_header_value("Sec-WebSocket-Protocol", proto)?;
        response.extend_from_slice(format!("Sec-WebSocket-Protocol: {proto}\r\n").as_bytes());
    }
    response.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", compute_accept_key(key)).as_bytes());
    response.extend_from_slice(b"\r\n");
    Ok(response)
}

/// A single unmasked text frame.
#[must_use]
pub fn frame_text(text: &str) -> Vec<u8> {
    Frame::text(text).to_bytes(None)
}

/// A single unmasked binary frame.
#[must_use]
pub fn frame_binary(data: &[u8]) -> Vec<u8> {
    Frame::binary(data).to_bytes(None)
}

/// A close frame carrying `code`.
///
/// Codes that may not appear on the wire (1005, 1006, ...) produce a
/// code-less close.
#[must_use]
pub fn frame_close(code: CloseCode) -> Vec<u8> {
    let code = code.is_valid().then_some(code);
    Frame::close(code, "").to_bytes(None)
}

/// A ping; callers keep `data` within 125 bytes.
#[must_use]
pub fn frame_ping(data: &[u8]) -> Vec<u8> {
    Frame::ping(data).to_bytes(None)
}

/// A pong echoing the ping payload.
#[must_use]
pub fn frame_pong(data: &[u8]) -> Vec<u8> {
    Frame::pong(data).to_bytes(None)
}

/// Streaming decoder for client-to-server frames.
///
/// Bytes are appended with [`Hybi13Decoder::extend`]; complete events are
/// pulled with [`Hybi13Decoder::next_message`].
#[derive(Debug)]
pub struct Hybi13Decoder {
    buffer: BytesMut,
    validator: FrameValidator,
    assembler: MessageAssembler,
}

impl Hybi13Decoder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            validator: FrameValidator::new(limits.clone()),
            assembler: MessageAssembler::new(limits),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next event, or `Ok(None)` if more bytes are needed.
    ///
    /// Fragments of an unfinished message are consumed without producing an
    /// event; control frames between them are returned immediately.
    ///
    /// # Errors
    ///
    /// Any framing, size or UTF-8 violation. The decoder is unusable afterwards.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            let Some((frame, used)) = Frame::parse(&self.buffer, &self.validator)? else {
                return Ok(None);
            };
            self.buffer.advance(used);

            let message = match frame.opcode {
                OpCode::Close => Message::Close(CloseFrame::parse(frame.payload())?),
                OpCode::Ping => Message::Ping(frame.into_payload()),
                OpCode::Pong => Message::Pong(frame.into_payload()),
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    match self.assembler.push(frame)? {
                        Some(message) => message,
                        None => continue,
                    }
                }
            };
            return Ok(Some(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Scheme;

    const MASK: [u8; 4] = [0x11, 0x22, 0x33, 0x44];

    fn request(key: &str) -> Request {
        Request::new("GET", "/chat", Scheme::Ws)
            .with_header("Host", "server.example.com")
            .with_header("Sec-WebSocket-Key", key)
            .with_header("Sec-WebSocket-Version", "13")
    }

    fn client(frame: Frame) -> Vec<u8> {
        frame.to_bytes(Some(MASK))
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_handshake_response() {
        let response = handshake(&request("dGhlIHNhbXBsZSBub25jZQ=="), Some("chat")).unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.contains("Sec-WebSocket-Protocol: chat\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_handshake_rejects_bad_keys() {
        let missing = Request::new("GET", "/", Scheme::Ws);
        assert!(matches!(handshake(&missing, None), Err(Error::InvalidHandshake(_))));
        assert!(matches!(
            handshake(&request("not base64!"), None),
            Err(Error::InvalidHandshake(_))
        ));
        // "short" is 5 bytes
        assert!(matches!(
            handshake(&request("c2hvcnQ="), None),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_handshake_requires_get() {
        let post = Request::new("POST", "/chat", Scheme::Ws)
            .with_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .with_header("Sec-WebSocket-Version", "13");
        assert!(matches!(handshake(&post, None), Err(Error::InvalidHandshake(_))));
    }

    #[test]
    fn test_handshake_rejects_header_injection() {
        assert!(matches!(
            handshake(&request("dGhlIHNhbXBsZSBub25jZQ=="), Some("chat\r\nX-Evil: 1")),
            Err(Error::InvalidHeaderValue { .. })
        ));
    }

    #[test]
    fn test_frame_close_codes() {
        assert_eq!(frame_close(CloseCode::Normal), vec![0x88, 0x02, 0x03, 0xE8]);
        assert_eq!(frame_close(CloseCode::Abnormal), vec![0x88, 0x00]);
    }

    #[test]
    fn test_decode_text_across_reads() {
        let mut decoder = Hybi13Decoder::new(Limits::default());
        let bytes = client(Frame::text("hello world"));
        let (a, b) = bytes.split_at(5);
        decoder.extend(a);
        assert_eq!(decoder.next_message().unwrap(), None);
        decoder.extend(b);
        assert_eq!(
            decoder.next_message().unwrap(),
            Some(Message::Text("hello world".into()))
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_fragmented_with_interleaved_ping() {
        let mut decoder = Hybi13Decoder::new(Limits::default());
        decoder.extend(&client(Frame::new(false, OpCode::Text, b"Hel".to_vec())));
        decoder.extend(&client(Frame::ping("p")));
        decoder.extend(&client(Frame::new(true, OpCode::Continuation, b"lo".to_vec())));

        assert_eq!(decoder.next_message().unwrap(), Some(Message::Ping(b"p".to_vec())));
        assert_eq!(decoder.next_message().unwrap(), Some(Message::Text("Hello".into())));
        assert_eq!(decoder.next_message().unwrap(), None);
    }

    #[test]
    fn test_decode_close() {
        let mut decoder = Hybi13Decoder::new(Limits::default());
        decoder.extend(&client(Frame::close(Some(CloseCode::GoingAway), "bye")));
        decoder.extend(&client(Frame::close(None, "")));
        assert_eq!(
            decoder.next_message().unwrap(),
            Some(Message::Close(Some(CloseFrame::new(CloseCode::GoingAway, "bye"))))
        );
        assert_eq!(decoder.next_message().unwrap(), Some(Message::Close(None)));
    }

    #[test]
    fn test_decode_rejects_unmasked() {
        let mut decoder = Hybi13Decoder::new(Limits::default());
        decoder.extend(&frame_text("x"));
        assert_eq!(decoder.next_message(), Err(Error::UnmaskedClientFrame));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let mut decoder = Hybi13Decoder::new(Limits::default());
        decoder.extend(&client(Frame::text(vec![0xC3, 0x28])));
        let err = decoder.next_message().unwrap_err();
        assert_eq!(err, Error::InvalidUtf8);
        assert_eq!(err.close_code(), CloseCode::InvalidPayload);
    }
}
