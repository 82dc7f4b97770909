//! Hybi13 frame parsing and serialization (RFC 6455 Section 5.2).

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::validation::FrameValidator;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// The fixed part of a frame, available before any payload byte arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    /// Declared payload length as sent on the wire.
    pub payload_len: u64,
    /// Header length including the extended length and masking key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a header from the front of `buf`.
    ///
    /// Returns `Ok(None)` until enough bytes for the complete header are buffered.
    ///
    /// # Errors
    ///
    /// `Error::ReservedOpcode` if the opcode nibble is not defined.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>> {
        let [byte0, byte1, rest @ ..] = buf else {
            return Ok(None);
        };

        let opcode = OpCode::from_nibble(byte0 & 0x0F)?;
        let masked = byte1 & 0x80 != 0;

        let (payload_len, len_bytes) = match byte1 & 0x7F {
            126 => match rest {
                [a, b, ..] => (u64::from(u16::from_be_bytes([*a, *b])), 2),
                _ => return Ok(None),
            },
            127 => match rest.get(..8) {
                Some(ext) => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(ext);
                    (u64::from_be_bytes(raw), 8)
                }
                None => return Ok(None),
            },
            short => (u64::from(short), 0),
        };

        let mask = if masked {
            match rest.get(len_bytes..len_bytes + 4) {
                Some(key) => Some([key[0], key[1], key[2], key[3]]),
                None => return Ok(None),
            }
        } else {
            None
        };

        Ok(Some(Self {
            fin: byte0 & 0x80 != 0,
            rsv1: byte0 & 0x40 != 0,
            rsv2: byte0 & 0x20 != 0,
            rsv3: byte0 & 0x10 != 0,
            opcode,
            mask,
            payload_len,
            header_len: 2 + len_bytes + if masked { 4 } else { 0 },
        }))
    }

    #[inline]
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.mask.is_some()
    }
}

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                     Masking key (if MASK set)                 |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// A close frame. `None` produces an empty, code-less payload.
    #[must_use]
    pub fn close(code: Option<CloseCode>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = Vec::with_capacity(2 + reason.len());
                data.extend_from_slice(&code.as_u16().to_be_bytes());
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// The header is checked by `validator` as soon as it is complete, so an
    /// oversized or malformed frame is rejected before its payload arrives.
    /// Returns the frame and the number of bytes it occupied, or `Ok(None)`
    /// if `buf` does not hold a whole frame yet.
    ///
    /// # Errors
    ///
    /// Any error from [`FrameHeader::parse`] or [`FrameValidator::validate`].
    pub fn parse(buf: &[u8], validator: &FrameValidator) -> Result<Option<(Self, usize)>> {
        let Some(header) = FrameHeader::parse(buf)? else {
            return Ok(None);
        };
        validator.validate(&header)?;

        // the validator bounded payload_len by max_frame_size, which is a usize
        let payload_len = usize::try_from(header.payload_len).map_err(|_| Error::FrameTooLarge {
            size: header.payload_len,
            max: usize::MAX,
        })?;
        let total = header.header_len + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        Ok(Some((Self::new(header.fin, header.opcode, payload), total)))
    }

    /// Append the wire form of this frame to `dst`.
    ///
    /// Servers never mask; `mask` exists for peers that must.
    pub fn encode(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let len = self.payload.len();
        dst.reserve(self.wire_size(mask.is_some()));

        let fin_bit = if self.fin { 0x80 } else { 0x00 };
        dst.put_u8(fin_bit | self.opcode.as_u8());

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if len <= MAX_CONTROL_FRAME_PAYLOAD {
            dst.put_u8(mask_bit | len as u8);
        } else if let Ok(short) = u16::try_from(len) {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(short);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Encode into a fresh byte vector.
    #[must_use]
    pub fn to_bytes(&self, mask: Option<[u8; 4]>) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.wire_size(mask.is_some()));
        self.encode(&mut buf, mask);
        buf.to_vec()
    }

    /// Number of bytes [`Frame::encode`] will append.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len = self.payload.len();
        let extended = match len {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        2 + extended + if masked { 4 } else { 0 } + len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    fn validator() -> FrameValidator {
        FrameValidator::new(Limits::default())
    }

    #[test]
    fn test_parse_masked_text_frame() {
        // RFC 6455 Section 5.7
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let (frame, used) = Frame::parse(&data, &validator()).unwrap().unwrap();
        assert_eq!(used, 11);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_parse_header_extended_lengths() {
        let header = FrameHeader::parse(&[0x82, 0xFE, 0x01, 0x00, 1, 2, 3, 4])
            .unwrap()
            .unwrap();
        assert_eq!(header.payload_len, 256);
        assert_eq!(header.header_len, 8);

        let mut data = vec![0x82, 0xFF];
        data.extend_from_slice(&65536u64.to_be_bytes());
        data.extend_from_slice(&KEY);
        let header = FrameHeader::parse(&data).unwrap().unwrap();
        assert_eq!(header.payload_len, 65536);
        assert_eq!(header.header_len, 14);
        assert_eq!(header.mask, Some(KEY));
    }

    #[test]
    fn test_parse_needs_more_data() {
        let full = Frame::text("Hello").to_bytes(Some(KEY));
        for cut in 0..full.len() {
            assert!(
                Frame::parse(&full[..cut], &validator()).unwrap().is_none(),
                "cut at {cut}"
            );
        }
        assert!(Frame::parse(&full, &validator()).unwrap().is_some());
    }

    #[test]
    fn test_parse_partial_extended_length() {
        assert!(FrameHeader::parse(&[0x82, 0xFE, 0x01]).unwrap().is_none());
        assert!(FrameHeader::parse(&[0x82, 0xFF, 0, 0, 0]).unwrap().is_none());
        assert!(FrameHeader::parse(&[0x82, 0x85, 0x37]).unwrap().is_none());
    }

    #[test]
    fn test_parse_reserved_opcode() {
        assert!(matches!(
            Frame::parse(&[0x83, 0x80, 0, 0, 0, 0], &validator()),
            Err(Error::ReservedOpcode(0x3))
        ));
    }

    #[test]
    fn test_oversized_frame_rejected_from_header() {
        let limits = Limits::new(1024, 4096, 8192);
        let validator = FrameValidator::new(limits);
        let mut data = vec![0x82, 0xFF];
        data.extend_from_slice(&(2048u64).to_be_bytes());
        data.extend_from_slice(&KEY);
        // no payload bytes at all yet
        assert!(matches!(
            Frame::parse(&data, &validator),
            Err(Error::FrameTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_encode_unmasked_lengths() {
        assert_eq!(Frame::text("Hello").to_bytes(None), b"\x81\x05Hello");

        let medium = Frame::binary(vec![0u8; 126]).to_bytes(None);
        assert_eq!(&medium[..4], &[0x82, 126, 0x00, 126]);
        assert_eq!(medium.len(), 4 + 126);

        let large = Frame::binary(vec![0u8; 65536]).to_bytes(None);
        assert_eq!(large[1], 127);
        assert_eq!(&large[2..10], &65536u64.to_be_bytes());
        assert_eq!(large.len(), 10 + 65536);
    }

    #[test]
    fn test_encode_masked_matches_rfc_example() {
        assert_eq!(
            Frame::text("Hello").to_bytes(Some(KEY)),
            vec![0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_close_payload() {
        let frame = Frame::close(Some(CloseCode::Normal), "bye");
        assert_eq!(frame.payload(), b"\x03\xe8bye");
        assert!(Frame::close(None, "").payload().is_empty());
    }

    #[test]
    fn test_wire_size() {
        for len in [0, 125, 126, 65535, 65536] {
            let frame = Frame::binary(vec![1u8; len]);
            assert_eq!(frame.wire_size(false), frame.to_bytes(None).len());
            assert_eq!(frame.wire_size(true), frame.to_bytes(Some(KEY)).len());
        }
    }

    #[test]
    fn test_parse_consumes_only_first_frame() {
        let mut data = Frame::ping("a").to_bytes(Some(KEY));
        data.extend(Frame::text("b").to_bytes(Some(KEY)));
        let (frame, used) = Frame::parse(&data, &validator()).unwrap().unwrap();
        assert_eq!(frame.opcode, OpCode::Ping);
        let (frame, _) = Frame::parse(&data[used..], &validator()).unwrap().unwrap();
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"b");
    }
}
