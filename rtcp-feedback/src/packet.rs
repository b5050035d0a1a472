//! Decoded RTCP packet types
//!
//! Field layouts follow RFC 3550 section 6.4 and onward.

use std::fmt;

/// RTCP packet type (second byte of every RTCP header)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    SenderReport,
    ReceiverReport,
    SourceDescription,
    Goodbye,
    Application,
    Unknown(u8),
}

impl PacketType {
    pub const SR: u8 = 200;
    pub const RR: u8 = 201;
    pub const SDES: u8 = 202;
    pub const BYE: u8 = 203;
    pub const APP: u8 = 204;

    /// Raw packet type code
    pub fn code(&self) -> u8 {
        match self {
            PacketType::SenderReport => Self::SR,
            PacketType::ReceiverReport => Self::RR,
            PacketType::SourceDescription => Self::SDES,
            PacketType::Goodbye => Self::BYE,
            PacketType::Application => Self::APP,
            PacketType::Unknown(code) => *code,
        }
    }
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            Self::SR => PacketType::SenderReport,
            Self::RR => PacketType::ReceiverReport,
            Self::SDES => PacketType::SourceDescription,
            Self::BYE => PacketType::Goodbye,
            Self::APP => PacketType::Application,
            other => PacketType::Unknown(other),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::SenderReport => f.write_str("Sender Report"),
            PacketType::ReceiverReport => f.write_str("Receiver Report"),
            PacketType::SourceDescription => f.write_str("Source Description"),
            PacketType::Goodbye => f.write_str("Goodbye"),
            PacketType::Application => f.write_str("Application"),
            PacketType::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// One reception report block (24 bytes on the wire)
///
/// Format: [ssrc:4][fraction_lost:1][cumulative_lost:3][highest_seq:4]
///         [jitter:4][last_sr:4][delay_since_last_sr:4]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportBlock {
    /// Source this block reports on
    pub ssrc: u32,
    /// Fixed-point loss fraction (lost / expected * 256)
    pub fraction_lost: u8,
    /// Cumulative packets lost (24-bit signed)
    pub cumulative_lost: i32,
    /// Extended highest sequence number received
    pub highest_seq: u32,
    /// Interarrival jitter in RTP timestamp units
    pub jitter: u32,
    /// Middle 32 bits of the last SR NTP timestamp
    pub last_sr: u32,
    /// Delay since last SR in 1/65536 s
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    pub const WIRE_SIZE: usize = 24;

    /// Loss fraction as a ratio in [0, 1)
    pub fn loss_ratio(&self) -> f64 {
        self.fraction_lost as f64 / 256.0
    }
}

/// Sender statistics carried by an SR (20 bytes on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderInfo {
    pub ntp_timestamp: u64,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

impl SenderInfo {
    pub const WIRE_SIZE: usize = 20;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    pub item_type: u8,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub source: u32,
    pub items: Vec<SdesItem>,
}

/// Body of a decoded RTCP packet
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackPayload {
    SenderReport {
        ssrc: u32,
        info: SenderInfo,
        blocks: Vec<ReportBlock>,
    },
    ReceiverReport {
        ssrc: u32,
        blocks: Vec<ReportBlock>,
    },
    SourceDescription(Vec<SdesChunk>),
    Goodbye {
        sources: Vec<u32>,
        reason: Option<String>,
    },
    Application {
        ssrc: u32,
        subtype: u8,
        name: String,
        data: Vec<u8>,
    },
    /// Feedback types this crate does not interpret (RTPFB, PSFB, XR, ...)
    Opaque(Vec<u8>),
}

/// One entry of a compound RTCP packet
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPacket {
    pub packet_type: PacketType,
    pub payload: FeedbackPayload,
}

impl FeedbackPacket {
    /// Report blocks carried by a Receiver Report, empty for every other type
    pub fn receiver_blocks(&self) -> &[ReportBlock] {
        match &self.payload {
            FeedbackPayload::ReceiverReport { blocks, .. } => blocks,
            _ => &[],
        }
    }
}
