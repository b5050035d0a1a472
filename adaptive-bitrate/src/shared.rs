//! Controller shared between the streaming thread and the control plane
//!
//! Only the streaming thread writes (at most once per cooldown); the control
//! plane takes short snapshots, so a plain mutex never contends in practice.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rtcp_feedback::ReportBlock;

use crate::config::AdaptationBounds;
use crate::controller::{AdaptiveController, Adjustment};

/// Point-in-time copy of the controller targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub bitrate: u32,
    pub fps: u32,
    pub last_adapt: Option<Instant>,
    pub bounds: AdaptationBounds,
}

#[derive(Debug, Clone)]
pub struct SharedController {
    inner: Arc<Mutex<AdaptiveController>>,
}

impl SharedController {
    pub fn new(controller: AdaptiveController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AdaptiveController> {
        // Controller state is consistent between statements, so a panic
        // elsewhere never leaves it half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed every block of one Receiver Report, returning the changes made
    pub fn observe_all(&self, blocks: &[ReportBlock], now: Instant) -> Vec<Adjustment> {
        let mut controller = self.lock();
        blocks
            .iter()
            .filter_map(|block| controller.observe(block, now))
            .collect()
    }

    pub fn observe(&self, block: &ReportBlock, now: Instant) -> Option<Adjustment> {
        self.lock().observe(block, now)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let controller = self.lock();
        let state = controller.state();
        ControllerSnapshot {
            bitrate: state.current_bitrate,
            fps: state.current_fps,
            last_adapt: state.last_adapt,
            bounds: *controller.bounds(),
        }
    }
}
