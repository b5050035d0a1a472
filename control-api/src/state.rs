use std::sync::Arc;
use std::time::{Duration, Instant};

use adaptive_bitrate::SharedController;
use rtcp_feedback::FeedbackDecoder;
use stage_control::StageService;

/// Shared state for the control-plane handlers.
pub struct ApiState {
    /// Stage toggle and property access; calls may block on the pipeline
    pub stage: Arc<dyn StageService>,

    /// Adaptive controller, read-only from here
    pub controller: SharedController,

    /// Source of the last RTCP activity time
    pub decoder: Arc<FeedbackDecoder>,

    /// Whether controller targets are pushed onto the encoder
    pub apply: bool,

    /// Reported by the health endpoint
    pub version: String,

    started: Instant,
}

impl ApiState {
    pub fn new(
        stage: Arc<dyn StageService>,
        controller: SharedController,
        decoder: Arc<FeedbackDecoder>,
        apply: bool,
        version: String,
    ) -> Self {
        Self {
            stage,
            controller,
            decoder,
            apply,
            version,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
