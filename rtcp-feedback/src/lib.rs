//! RTCP feedback decoding
//!
//! Parses the compound RTCP packets a receiver sends back about our RTP stream
//! and exposes the receiver report blocks (loss fraction, cumulative loss,
//! jitter) that drive adaptive bitrate control.
//!
//! # Components
//!
//! - [`packet`]: Decoded packet types (SR, RR, SDES, BYE, APP)
//! - [`decoder`]: Compound framing, per-packet decoding and the activity clock

pub mod decoder;
pub mod error;
pub mod packet;

pub use decoder::{decode_packet, validate_compound, FeedbackDecoder, RawPacket, RawPackets};
pub use error::DecodeError;
pub use packet::{
    FeedbackPacket, FeedbackPayload, PacketType, ReportBlock, SdesChunk, SdesItem, SenderInfo,
};
