//! Error types for OpenFlow wire decoding.

use bytes::Buf;
use thiserror::Error;

/// Errors raised while decoding OpenFlow frames and their sub-structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer bytes remain than the structure requires
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    /// A length field is inconsistent with the structure it describes
    #[error("invalid length {length} for {what}")]
    InvalidLength { what: &'static str, length: usize },

    #[error("unsupported OpenFlow version 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("unsupported match type {0}")]
    UnsupportedMatchType(u16),

    /// No deserializer is registered for an instruction code
    #[error(
        "no deserializer registered for instruction type {type_code} \
         (version 0x{version:02x}, experimenter {experimenter:?})"
    )]
    UnregisteredInstruction {
        version: u8,
        type_code: u16,
        experimenter: Option<u32>,
    },
}

/// Result type alias for WireError
pub type Result<T> = std::result::Result<T, WireError>;

pub(crate) fn need<B: Buf>(buf: &B, need: usize, what: &'static str) -> Result<()> {
    if buf.remaining() < need {
        return Err(WireError::Truncated {
            what,
            need,
            have: buf.remaining(),
        });
    }
    Ok(())
}
