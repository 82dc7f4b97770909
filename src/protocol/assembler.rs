//! Fragment reassembly for Hybi13 data messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Accumulates Text/Binary fragments until the final one arrives.
///
/// Control frames never pass through the assembler; they may be interleaved
/// between fragments and are dispatched directly by the decoder.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            limits,
        }
    }

    /// Add a data frame. Returns the complete message once FIN is seen.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing in
    ///   progress, or a new Text/Binary frame while a message is open
    /// - `Error::MessageTooLarge` if the reassembled size exceeds the limit
    /// - `Error::InvalidUtf8` if a completed text message is not UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        debug_assert!(frame.opcode.is_data());

        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame without a message in progress".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (_, Some(open)) => {
                return Err(Error::ProtocolViolation(format!(
                    "{} frame received while a fragmented {open} message is in progress",
                    frame.opcode
                )));
            }
            (opcode, None) => self.opcode = Some(opcode),
        }

        let size = self.buffer.len() + frame.payload().len();
        if let Err(e) = self.limits.check_message_size(size) {
            self.reset();
            return Err(e);
        }
        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        match self.opcode.take() {
            Some(OpCode::Text) => Ok(Some(Message::Text(String::from_utf8(payload)?))),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }

    /// Returns `true` while a fragmented message is open.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.opcode = None;
    }
}
