//! Compound RTCP decoding
//!
//! A feedback buffer is validated as a whole (framing only), then each packet
//! is decoded on its own so one malformed packet never hides the valid ones
//! that follow it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::DecodeError;
use crate::packet::{
    FeedbackPacket, FeedbackPayload, PacketType, ReportBlock, SdesChunk, SdesItem, SenderInfo,
};

const RTCP_VERSION: u8 = 2;
const HEADER_SIZE: usize = 4;

/// One framed packet inside a compound buffer
///
/// `body` is everything after the 4-byte header, padding included.
#[derive(Debug, Clone, Copy)]
pub struct RawPacket<'a> {
    pub offset: usize,
    pub padding: bool,
    /// Report count, source count or APP subtype depending on the type
    pub count: u8,
    pub packet_type: PacketType,
    pub body: &'a [u8],
}

/// Iterator over the packets of a compound buffer
///
/// Stops at the first header that does not fit, so run [`validate_compound`]
/// first when the whole buffer has to be trustworthy.
pub struct RawPackets<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RawPackets<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for RawPackets<'a> {
    type Item = RawPacket<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.data.get(self.offset..)?;
        if rest.len() < HEADER_SIZE {
            return None;
        }
        let len = packet_len(rest);
        let packet = rest.get(..len)?;
        let raw = RawPacket {
            offset: self.offset,
            padding: packet[0] & 0x20 != 0,
            count: packet[0] & 0x1f,
            packet_type: PacketType::from(packet[1]),
            body: &packet[HEADER_SIZE..],
        };
        self.offset += len;
        Some(raw)
    }
}

/// Total packet size in bytes from the header length field (32-bit words minus one)
fn packet_len(header: &[u8]) -> usize {
    (u16::from_be_bytes([header[2], header[3]]) as usize + 1) * 4
}

/// Check that `data` is a well-formed compound RTCP container
///
/// Every packet must carry version 2, fit inside the buffer and end exactly at
/// the buffer end; only the last packet may be padded.
pub fn validate_compound(data: &[u8]) -> Result<(), DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    if data.len() % 4 != 0 {
        return Err(DecodeError::Unaligned(data.len()));
    }

    let mut offset = 0;
    while offset < data.len() {
        let header = &data[offset..];
        let version = header[0] >> 6;
        if version != RTCP_VERSION {
            return Err(DecodeError::BadVersion { version, offset });
        }
        let len = packet_len(header);
        if len > header.len() {
            return Err(DecodeError::LengthOverrun {
                offset,
                claimed: len,
                available: header.len(),
            });
        }
        if header[0] & 0x20 != 0 && offset + len != data.len() {
            return Err(DecodeError::MisplacedPadding(offset));
        }
        offset += len;
    }
    Ok(())
}

fn read_u32(buf: &[u8], at: usize, packet: &'static str) -> Result<u32, DecodeError> {
    buf.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DecodeError::Truncated {
            packet,
            needed: at + 4,
            available: buf.len(),
        })
}

fn require(buf: &[u8], needed: usize, packet: &'static str) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::Truncated {
            packet,
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn strip_padding<'a>(raw: &RawPacket<'a>) -> Result<&'a [u8], DecodeError> {
    if !raw.padding {
        return Ok(raw.body);
    }
    let pad = *raw.body.last().ok_or(DecodeError::BadPadding(0))?;
    if pad == 0 || pad as usize > raw.body.len() {
        return Err(DecodeError::BadPadding(pad));
    }
    Ok(&raw.body[..raw.body.len() - pad as usize])
}

fn read_blocks(
    buf: &[u8],
    start: usize,
    count: u8,
    packet: &'static str,
) -> Result<Vec<ReportBlock>, DecodeError> {
    require(buf, start + count as usize * ReportBlock::WIRE_SIZE, packet)?;

    (0..count as usize)
        .map(|i| {
            let at = start + i * ReportBlock::WIRE_SIZE;
            let loss_word = read_u32(buf, at + 4, packet)?;
            // Low 24 bits are a signed count
            let cumulative_lost = ((loss_word << 8) as i32) >> 8;
            Ok(ReportBlock {
                ssrc: read_u32(buf, at, packet)?,
                fraction_lost: (loss_word >> 24) as u8,
                cumulative_lost,
                highest_seq: read_u32(buf, at + 8, packet)?,
                jitter: read_u32(buf, at + 12, packet)?,
                last_sr: read_u32(buf, at + 16, packet)?,
                delay_since_last_sr: read_u32(buf, at + 20, packet)?,
            })
        })
        .collect()
}

fn read_sdes(buf: &[u8], count: u8) -> Result<Vec<SdesChunk>, DecodeError> {
    const PACKET: &str = "Source Description";
    let mut chunks = Vec::with_capacity(count as usize);
    let mut at = 0;

    for _ in 0..count {
        let source = read_u32(buf, at, PACKET)?;
        at += 4;
        let mut items = Vec::new();
        loop {
            require(buf, at + 1, PACKET)?;
            let item_type = buf[at];
            if item_type == 0 {
                // End of chunk: null byte(s) up to the next 32-bit boundary
                at = (at + 4) & !3;
                break;
            }
            require(buf, at + 2, PACKET)?;
            let len = buf[at + 1] as usize;
            require(buf, at + 2 + len, PACKET)?;
            items.push(SdesItem {
                item_type,
                value: String::from_utf8_lossy(&buf[at + 2..at + 2 + len]).into_owned(),
            });
            at += 2 + len;
        }
        chunks.push(SdesChunk { source, items });
    }
    Ok(chunks)
}

fn read_bye(buf: &[u8], count: u8) -> Result<FeedbackPayload, DecodeError> {
    const PACKET: &str = "Goodbye";
    let sources = (0..count as usize)
        .map(|i| read_u32(buf, i * 4, PACKET))
        .collect::<Result<Vec<_>, _>>()?;

    let at = count as usize * 4;
    let reason = match buf.get(at) {
        Some(&len) if len > 0 => {
            require(buf, at + 1 + len as usize, PACKET)?;
            Some(String::from_utf8_lossy(&buf[at + 1..at + 1 + len as usize]).into_owned())
        }
        _ => None,
    };
    Ok(FeedbackPayload::Goodbye { sources, reason })
}

/// Decode a single framed packet
pub fn decode_packet(raw: &RawPacket<'_>) -> Result<FeedbackPacket, DecodeError> {
    let body = strip_padding(raw)?;

    let payload = match raw.packet_type {
        PacketType::ReceiverReport => {
            const PACKET: &str = "Receiver Report";
            FeedbackPayload::ReceiverReport {
                ssrc: read_u32(body, 0, PACKET)?,
                blocks: read_blocks(body, 4, raw.count, PACKET)?,
            }
        }
        PacketType::SenderReport => {
            const PACKET: &str = "Sender Report";
            require(body, 4 + SenderInfo::WIRE_SIZE, PACKET)?;
            let ntp_hi = read_u32(body, 4, PACKET)? as u64;
            let ntp_lo = read_u32(body, 8, PACKET)? as u64;
            FeedbackPayload::SenderReport {
                ssrc: read_u32(body, 0, PACKET)?,
                info: SenderInfo {
                    ntp_timestamp: (ntp_hi << 32) | ntp_lo,
                    rtp_timestamp: read_u32(body, 12, PACKET)?,
                    packet_count: read_u32(body, 16, PACKET)?,
                    octet_count: read_u32(body, 20, PACKET)?,
                },
                blocks: read_blocks(body, 4 + SenderInfo::WIRE_SIZE, raw.count, PACKET)?,
            }
        }
        PacketType::SourceDescription => FeedbackPayload::SourceDescription(read_sdes(body, raw.count)?),
        PacketType::Goodbye => read_bye(body, raw.count)?,
        PacketType::Application => {
            const PACKET: &str = "Application";
            require(body, 8, PACKET)?;
            FeedbackPayload::Application {
                ssrc: read_u32(body, 0, PACKET)?,
                subtype: raw.count,
                name: String::from_utf8_lossy(&body[4..8]).into_owned(),
                data: body[8..].to_vec(),
            }
        }
        PacketType::Unknown(_) => FeedbackPayload::Opaque(body.to_vec()),
    };

    Ok(FeedbackPacket {
        packet_type: raw.packet_type,
        payload,
    })
}

/// Stateless RTCP decoder apart from the last-activity clock
///
/// Called from the streaming thread for every feedback buffer; never blocks.
#[derive(Debug)]
pub struct FeedbackDecoder {
    epoch: Instant,
    /// Microseconds since `epoch` plus one, zero when nothing was seen yet
    last_activity_us: AtomicU64,
}

impl Default for FeedbackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackDecoder {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_activity_us: AtomicU64::new(0),
        }
    }

    /// Decode a mapped feedback buffer
    ///
    /// A malformed container yields no packets. Malformed packets inside a
    /// valid container are logged and skipped.
    pub fn decode(&self, data: &[u8]) -> Vec<FeedbackPacket> {
        self.decode_at(data, Instant::now())
    }

    /// Same as [`decode`](Self::decode) with an explicit activity timestamp
    pub fn decode_at(&self, data: &[u8], now: Instant) -> Vec<FeedbackPacket> {
        if let Err(e) = validate_compound(data) {
            tracing::warn!(error = %e, len = data.len(), "[RTCP] dropping malformed feedback buffer");
            return Vec::new();
        }
        self.touch(now);

        let mut packets = Vec::new();
        for raw in RawPackets::new(data) {
            tracing::info!(
                packet_type = raw.packet_type.code(),
                "[RTCP] {}",
                raw.packet_type
            );
            match decode_packet(&raw) {
                Ok(packet) => {
                    let blocks = packet.receiver_blocks();
                    if !blocks.is_empty() {
                        tracing::info!("[RTCP] report-blocks: {}", blocks.len());
                    }
                    for (i, rb) in blocks.iter().enumerate() {
                        tracing::info!(
                            "[RTCP] block#{}: loss={:.3}, total_lost={}, jitter={}",
                            i,
                            rb.loss_ratio(),
                            rb.cumulative_lost,
                            rb.jitter
                        );
                    }
                    packets.push(packet);
                }
                Err(e) => {
                    tracing::error!(offset = raw.offset, error = %e, "[RTCP] parse error");
                }
            }
        }
        packets
    }

    fn touch(&self, now: Instant) {
        let micros = now.saturating_duration_since(self.epoch).as_micros() as u64;
        self.last_activity_us.store(micros + 1, Ordering::Relaxed);
    }

    /// When the last well-formed feedback buffer arrived
    pub fn last_activity(&self) -> Option<Instant> {
        match self.last_activity_us.load(Ordering::Relaxed) {
            0 => None,
            stored => Some(self.epoch + Duration::from_micros(stored - 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(count: u8, pt: u8, body_len: usize) -> Vec<u8> {
        let words = ((HEADER_SIZE + body_len) / 4 - 1) as u16;
        let mut buf = vec![0x80 | count, pt];
        buf.extend_from_slice(&words.to_be_bytes());
        buf
    }

    fn block(ssrc: u32, fraction: u8, lost: i32, jitter: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ssrc.to_be_bytes());
        let word = ((fraction as u32) << 24) | (lost as u32 & 0x00ff_ffff);
        buf.extend_from_slice(&word.to_be_bytes());
        buf.extend_from_slice(&1000u32.to_be_bytes());
        buf.extend_from_slice(&jitter.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf
    }

    fn receiver_report(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut body = 0xdead_beefu32.to_be_bytes().to_vec();
        for b in blocks {
            body.extend_from_slice(b);
        }
        let mut buf = header(blocks.len() as u8, PacketType::RR, body.len());
        buf.extend_from_slice(&body);
        buf
    }

    fn goodbye(ssrc: u32, reason: &str) -> Vec<u8> {
        let mut body = ssrc.to_be_bytes().to_vec();
        body.push(reason.len() as u8);
        body.extend_from_slice(reason.as_bytes());
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let mut buf = header(1, PacketType::BYE, body.len());
        buf.extend_from_slice(&body);
        buf
    }

    #[test]
    fn test_receiver_report_blocks() {
        let data = receiver_report(&[block(7, 26, 12, 345), block(8, 0, 0, 1)]);
        let decoder = FeedbackDecoder::new();
        let packets = decoder.decode(&data);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type, PacketType::ReceiverReport);
        let blocks = packets[0].receiver_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].ssrc, 7);
        assert_eq!(blocks[0].fraction_lost, 26);
        assert!((blocks[0].loss_ratio() - 26.0 / 256.0).abs() < f64::EPSILON);
        assert_eq!(blocks[0].cumulative_lost, 12);
        assert_eq!(blocks[0].jitter, 345);
        assert_eq!(blocks[1].ssrc, 8);
    }

    #[test]
    fn test_negative_cumulative_loss() {
        let data = receiver_report(&[block(1, 0, -3, 0)]);
        let packets = FeedbackDecoder::new().decode(&data);
        assert_eq!(packets[0].receiver_blocks()[0].cumulative_lost, -3);
    }

    #[test]
    fn test_compound_iterates_all_packets() {
        let mut data = receiver_report(&[block(1, 10, 0, 0)]);
        data.extend(goodbye(1, "bye"));

        let packets = FeedbackDecoder::new().decode(&data);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].packet_type, PacketType::Goodbye);
        assert_eq!(
            packets[1].payload,
            FeedbackPayload::Goodbye {
                sources: vec![1],
                reason: Some("bye".to_string()),
            }
        );
    }

    #[test]
    fn test_malformed_packet_does_not_hide_later_ones() {
        // RR that claims two blocks but only carries one
        let mut bad = receiver_report(&[block(1, 200, 0, 0)]);
        bad[0] = 0x80 | 2;
        let mut data = bad;
        data.extend(receiver_report(&[block(2, 3, 0, 0)]));

        let packets = FeedbackDecoder::new().decode(&data);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].receiver_blocks()[0].ssrc, 2);
    }

    #[test]
    fn test_malformed_container_yields_nothing() {
        let decoder = FeedbackDecoder::new();
        assert!(decoder.decode(&[]).is_empty());
        assert!(decoder.decode(&[0x80, 201, 0]).is_empty());

        let mut wrong_version = receiver_report(&[block(1, 0, 0, 0)]);
        wrong_version[0] = 0x40 | 1;
        assert!(decoder.decode(&wrong_version).is_empty());

        let mut overrun = receiver_report(&[block(1, 0, 0, 0)]);
        overrun[3] = 0x40;
        assert!(decoder.decode(&overrun).is_empty());

        assert!(decoder.last_activity().is_none());
    }

    #[test]
    fn test_validate_rejects_padding_before_last() {
        let mut first = receiver_report(&[]);
        first[0] |= 0x20;
        let mut data = first;
        data.extend(receiver_report(&[]));
        assert_eq!(validate_compound(&data), Err(DecodeError::MisplacedPadding(0)));
    }

    #[test]
    fn test_activity_recorded_even_when_packets_fail() {
        let mut bad = receiver_report(&[block(1, 0, 0, 0)]);
        bad[0] = 0x80 | 5;
        let decoder = FeedbackDecoder::new();
        let now = Instant::now();

        assert!(decoder.decode_at(&bad, now).is_empty());
        let seen = decoder.last_activity().expect("activity should be recorded");
        assert!(seen <= now && now.duration_since(seen) < Duration::from_millis(1));
    }

    #[test]
    fn test_sender_report_and_sdes() {
        let mut sr_body = 42u32.to_be_bytes().to_vec();
        sr_body.extend_from_slice(&1u32.to_be_bytes());
        sr_body.extend_from_slice(&2u32.to_be_bytes());
        sr_body.extend_from_slice(&3u32.to_be_bytes());
        sr_body.extend_from_slice(&4u32.to_be_bytes());
        sr_body.extend_from_slice(&5u32.to_be_bytes());
        sr_body.extend(block(9, 1, 0, 0));
        let mut data = header(1, PacketType::SR, sr_body.len());
        data.extend_from_slice(&sr_body);

        let mut sdes_body = 42u32.to_be_bytes().to_vec();
        sdes_body.extend_from_slice(&[1, 3, b'c', b'a', b'm', 0]);
        sdes_body.extend_from_slice(&[0, 0]);
        data.extend(header(1, PacketType::SDES, sdes_body.len()));
        data.extend_from_slice(&sdes_body);

        let packets = FeedbackDecoder::new().decode(&data);
        assert_eq!(packets.len(), 2);
        match &packets[0].payload {
            FeedbackPayload::SenderReport { ssrc, info, blocks } => {
                assert_eq!(*ssrc, 42);
                assert_eq!(info.ntp_timestamp, (1u64 << 32) | 2);
                assert_eq!(info.octet_count, 5);
                assert_eq!(blocks.len(), 1);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        // SR blocks never count as receiver feedback
        assert!(packets[0].receiver_blocks().is_empty());
        match &packets[1].payload {
            FeedbackPayload::SourceDescription(chunks) => {
                assert_eq!(chunks[0].source, 42);
                assert_eq!(chunks[0].items[0].value, "cam");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let mut data = header(1, 205, 8);
        data.extend_from_slice(&[0u8; 8]);
        let packets = FeedbackDecoder::new().decode(&data);
        assert_eq!(packets[0].packet_type, PacketType::Unknown(205));
        assert_eq!(packets[0].payload, FeedbackPayload::Opaque(vec![0u8; 8]));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_packet_types_logged_at_info() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut data = receiver_report(&[block(1, 10, 0, 0)]);
        data.extend(goodbye(1, "bye"));
        tracing::subscriber::with_default(subscriber, || FeedbackDecoder::new().decode(&data));

        let output = String::from_utf8_lossy(&logs.0.lock().expect("log buffer")).to_string();
        assert!(output.contains("[RTCP] Receiver Report"), "{}", output);
        assert!(output.contains("[RTCP] Goodbye"), "{}", output);
    }
}
