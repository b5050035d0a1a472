//! Adaptive bitrate controller
//!
//! Consumes one receiver report block at a time and decides whether to step
//! bitrate and framerate down, up, or leave them alone.

use std::time::Instant;

use rtcp_feedback::ReportBlock;

use crate::config::{AdaptationBounds, Thresholds};
use crate::error::BoundsError;

/// Current targets and the time of the last applied change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    /// Bits per second, always within the configured bounds
    pub current_bitrate: u32,
    /// Frames per second, always within the configured bounds
    pub current_fps: u32,
    /// None until the first change, so the first eligible block is never rate limited
    pub last_adapt: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// Values changed by one adaptation step
///
/// A `None` field was already at its floor/ceiling and stayed put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub direction: Direction,
    pub bitrate: Option<u32>,
    pub fps: Option<u32>,
}

/// Adaptive bitrate controller
///
/// Output is advisory: the caller decides whether to push the new targets
/// onto an encoder.
#[derive(Debug)]
pub struct AdaptiveController {
    bounds: AdaptationBounds,
    thresholds: Thresholds,
    state: ControllerState,
}

impl AdaptiveController {
    /// Create a controller starting at the maximum bitrate and framerate
    pub fn new(bounds: AdaptationBounds) -> Result<Self, BoundsError> {
        Self::with_thresholds(bounds, Thresholds::default())
    }

    /// Create a controller with custom loss thresholds
    pub fn with_thresholds(
        bounds: AdaptationBounds,
        thresholds: Thresholds,
    ) -> Result<Self, BoundsError> {
        bounds.validate()?;
        Ok(Self {
            state: ControllerState {
                current_bitrate: bounds.bitrate_max,
                current_fps: bounds.fps_max,
                last_adapt: None,
            },
            bounds,
            thresholds,
        })
    }

    /// Process one report block received at `now`
    pub fn observe(&mut self, block: &ReportBlock, now: Instant) -> Option<Adjustment> {
        self.observe_loss(block.loss_ratio(), now)
    }

    /// Process a raw loss ratio received at `now`
    pub fn observe_loss(&mut self, loss: f64, now: Instant) -> Option<Adjustment> {
        if let Some(last) = self.state.last_adapt {
            if now.saturating_duration_since(last) <= self.bounds.cooldown() {
                return None;
            }
        }

        let direction = if loss > self.thresholds.congested_above {
            Direction::Down
        } else if loss < self.thresholds.healthy_below {
            Direction::Up
        } else {
            // Dead zone
            return None;
        };

        let b = &self.bounds;
        let (bitrate, fps) = match direction {
            Direction::Down => (
                step_down(&mut self.state.current_bitrate, b.bitrate_min, b.bitrate_step),
                step_down(&mut self.state.current_fps, b.fps_min, b.fps_step),
            ),
            Direction::Up => (
                step_up(&mut self.state.current_bitrate, b.bitrate_max, b.bitrate_step),
                step_up(&mut self.state.current_fps, b.fps_max, b.fps_step),
            ),
        };

        if let Some(bitrate) = bitrate {
            tracing::info!(bitrate, loss, "set bitrate to: {}", bitrate);
        }
        if let Some(fps) = fps {
            tracing::info!(fps, loss, "set fps to: {}", fps);
        }

        if bitrate.is_none() && fps.is_none() {
            // Blocked at floor/ceiling: cooldown is left untouched
            return None;
        }

        self.state.last_adapt = Some(now);
        Some(Adjustment {
            direction,
            bitrate,
            fps,
        })
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn bounds(&self) -> &AdaptationBounds {
        &self.bounds
    }

    pub fn current_bitrate(&self) -> u32 {
        self.state.current_bitrate
    }

    pub fn current_fps(&self) -> u32 {
        self.state.current_fps
    }
}

fn step_down(value: &mut u32, floor: u32, step: u32) -> Option<u32> {
    if *value <= floor {
        return None;
    }
    *value = value.saturating_sub(step).max(floor);
    Some(*value)
}

fn step_up(value: &mut u32, ceiling: u32, step: u32) -> Option<u32> {
    if *value >= ceiling {
        return None;
    }
    *value = value.saturating_add(step).min(ceiling);
    Some(*value)
}
