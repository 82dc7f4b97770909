//! Header checks applied to every incoming Hybi13 frame.
//!
//! - Client frames must be masked (RFC 6455 Section 5.1)
//! - RSV bits must be clear, no extensions are negotiated (Section 5.2)
//! - Control frames are unfragmented and at most 125 bytes (Section 5.5)
//! - Declared payload length is bounded by [`Limits::max_frame_size`]

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Validator for frames received by the server.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    limits: Limits,
}

impl FrameValidator {
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate a parsed header before its payload is read.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` if the MASK bit is clear
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` for a control frame with FIN=0
    /// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
    /// - `Error::FrameTooLarge` if the declared length exceeds the limit
    pub fn validate(&self, header: &FrameHeader) -> Result<()> {
        if !header.is_masked() {
            return Err(Error::UnmaskedClientFrame);
        }
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(
                    usize::try_from(header.payload_len).unwrap_or(usize::MAX),
                ));
            }
        }
        self.limits.check_frame_size(header.payload_len)
    }
}
