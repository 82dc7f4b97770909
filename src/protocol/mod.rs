//! Wire protocols: version selection, handshakes and frame codecs.

pub mod assembler;
pub mod draft76;
pub mod frame;
pub mod hybi13;
pub mod mask;
pub mod opcode;
pub mod validation;
pub mod variant;

pub use assembler::MessageAssembler;
pub use frame::{Frame, FrameHeader};
pub use hybi13::{WS_GUID, compute_accept_key};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use validation::FrameValidator;
pub use variant::{
    AVAILABILITY_PROBE_PATH, Decoder, ProtocolVariant, negotiate_sub_protocol, select_variant,
};

use crate::error::{Error, Result};
use crate::request::Request;

/// Upgrades are only negotiated for `GET` requests.
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` for any other method.
pub(crate) fn require_get(request: &Request) -> Result<()> {
    if request.method() != "GET" {
        return Err(Error::InvalidHandshake(format!(
            "expected GET method, got {}",
            request.method()
        )));
    }
    Ok(())
}

/// Reject header values that would break the response framing.
///
/// # Errors
///
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
pub(crate) fn validate_header_value(header: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: header.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}
