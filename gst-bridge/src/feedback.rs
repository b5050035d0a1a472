//! Streaming-thread glue from RTCP buffers to the adaptive controller

use std::sync::Arc;
use std::time::Instant;

use adaptive_bitrate::{Adjustment, SharedController};
use rtcp_feedback::FeedbackDecoder;

use crate::error::BridgeError;

/// Pushes controller targets onto the encoding branch
pub trait EncoderControl: Send + Sync {
    fn set_bitrate(&self, bits_per_second: u32) -> Result<(), BridgeError>;

    fn set_fps(&self, fps: u32) -> Result<(), BridgeError>;
}

/// Handler for every RTCP buffer seen by a pad probe
///
/// Without an encoder the controller output is only logged.
#[derive(Clone)]
pub struct FeedbackTap {
    decoder: Arc<FeedbackDecoder>,
    controller: SharedController,
    encoder: Option<Arc<dyn EncoderControl>>,
}

impl FeedbackTap {
    pub fn new(decoder: Arc<FeedbackDecoder>, controller: SharedController) -> Self {
        Self {
            decoder,
            controller,
            encoder: None,
        }
    }

    /// Apply adjustments to `encoder` as they are made
    pub fn with_encoder(mut self, encoder: Arc<dyn EncoderControl>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn applies(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn on_buffer(&self, data: &[u8]) -> Vec<Adjustment> {
        self.on_buffer_at(data, Instant::now())
    }

    /// Decode one buffer and feed its receiver report blocks to the controller
    pub fn on_buffer_at(&self, data: &[u8], now: Instant) -> Vec<Adjustment> {
        let mut changes = Vec::new();
        for packet in self.decoder.decode_at(data, now) {
            let blocks = packet.receiver_blocks();
            if !blocks.is_empty() {
                changes.extend(self.controller.observe_all(blocks, now));
            }
        }

        if let Some(encoder) = &self.encoder {
            for change in &changes {
                apply(encoder.as_ref(), change);
            }
        }
        changes
    }
}

fn apply(encoder: &dyn EncoderControl, change: &Adjustment) {
    if let Some(bitrate) = change.bitrate {
        if let Err(e) = encoder.set_bitrate(bitrate) {
            tracing::warn!(bitrate, error = %e, "Failed to apply bitrate");
        }
    }
    if let Some(fps) = change.fps {
        if let Err(e) = encoder.set_fps(fps) {
            tracing::warn!(fps, error = %e, "Failed to apply fps");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_bitrate::{AdaptationBounds, AdaptiveController};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEncoder {
        bitrates: Mutex<Vec<u32>>,
        fps: Mutex<Vec<u32>>,
    }

    impl EncoderControl for RecordingEncoder {
        fn set_bitrate(&self, bits_per_second: u32) -> Result<(), BridgeError> {
            self.bitrates.lock().unwrap().push(bits_per_second);
            Ok(())
        }

        fn set_fps(&self, fps: u32) -> Result<(), BridgeError> {
            self.fps.lock().unwrap().push(fps);
            Ok(())
        }
    }

    /// One RR with a single block carrying `fraction_lost`
    fn receiver_report(fraction_lost: u8) -> Vec<u8> {
        let mut data = vec![0x81, 201, 0, 7];
        data.extend_from_slice(&0x1111_1111u32.to_be_bytes());
        data.extend_from_slice(&0x2222_2222u32.to_be_bytes());
        data.push(fraction_lost);
        data.extend_from_slice(&[0, 0, 12]);
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    fn tap() -> FeedbackTap {
        let controller = AdaptiveController::new(AdaptationBounds::default()).expect("bounds");
        FeedbackTap::new(Arc::new(FeedbackDecoder::new()), SharedController::new(controller))
    }

    #[test]
    fn test_congested_report_is_applied() {
        let encoder = Arc::new(RecordingEncoder::default());
        let tap = tap().with_encoder(encoder.clone());

        let changes = tap.on_buffer(&receiver_report(64));
        assert_eq!(changes.len(), 1);
        assert_eq!(*encoder.bitrates.lock().unwrap(), vec![3_750_000]);
        assert_eq!(*encoder.fps.lock().unwrap(), vec![25]);
    }

    #[test]
    fn test_advisory_mode_only_updates_controller() {
        let tap = tap();
        assert!(!tap.applies());

        let changes = tap.on_buffer(&receiver_report(64));
        assert_eq!(changes[0].bitrate, Some(3_750_000));
        assert_eq!(tap.controller.snapshot().bitrate, 3_750_000);
    }

    #[test]
    fn test_cooldown_spans_buffers() {
        let encoder = Arc::new(RecordingEncoder::default());
        let tap = tap().with_encoder(encoder.clone());
        let t0 = Instant::now();

        tap.on_buffer_at(&receiver_report(64), t0);
        tap.on_buffer_at(&receiver_report(64), t0 + Duration::from_secs(1));
        tap.on_buffer_at(&receiver_report(64), t0 + Duration::from_secs(6));

        assert_eq!(*encoder.bitrates.lock().unwrap(), vec![3_750_000, 3_500_000]);
    }

    #[test]
    fn test_garbage_buffer_changes_nothing() {
        let encoder = Arc::new(RecordingEncoder::default());
        let tap = tap().with_encoder(encoder.clone());

        assert!(tap.on_buffer(&[0xde, 0xad, 0xbe]).is_empty());
        assert!(encoder.bitrates.lock().unwrap().is_empty());
        assert!(tap.decoder.last_activity().is_none());
    }
}
