//! Error types for RTCP feedback decoding

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Empty feedback buffer")]
    Empty,

    #[error("Feedback buffer length {0} is not a multiple of 4")]
    Unaligned(usize),

    #[error("Unsupported RTCP version {version} at offset {offset}")]
    BadVersion { version: u8, offset: usize },

    #[error("RTCP packet at offset {offset} claims {claimed} bytes, only {available} left")]
    LengthOverrun {
        offset: usize,
        claimed: usize,
        available: usize,
    },

    #[error("Padding flag set on non-final RTCP packet at offset {0}")]
    MisplacedPadding(usize),

    #[error("{packet} truncated: need {needed} bytes, have {available}")]
    Truncated {
        packet: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid padding length {0}")]
    BadPadding(u8),
}
