//! Configuration types for adaptive bitrate streaming

use std::time::Duration;

use serde::Serialize;

use crate::error::BoundsError;

/// Hard limits and step sizes for adaptation
///
/// Loaded once at startup; the controller never proposes a value outside
/// `[min, max]` for either dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdaptationBounds {
    /// Minimum encoder bitrate in bits per second
    pub bitrate_min: u32,

    /// Maximum encoder bitrate in bits per second (also the starting point)
    pub bitrate_max: u32,

    /// Bitrate change per adaptation step
    pub bitrate_step: u32,

    /// Minimum framerate in fps
    pub fps_min: u32,

    /// Maximum framerate in fps (also the starting point)
    pub fps_max: u32,

    /// Framerate change per adaptation step
    pub fps_step: u32,

    /// Minimum time between two adaptation decisions, in microseconds
    pub cooldown_micros: u64,
}

fn default_cooldown_micros() -> u64 {
    5_000_000
}

impl Default for AdaptationBounds {
    fn default() -> Self {
        Self {
            bitrate_min: 500_000,
            bitrate_max: 4_000_000,
            bitrate_step: 250_000,
            fps_min: 10,
            fps_max: 30,
            fps_step: 5,
            cooldown_micros: default_cooldown_micros(),
        }
    }
}

impl AdaptationBounds {
    /// Check `0 < min <= max` for both dimensions and non-zero steps
    pub fn validate(&self) -> Result<(), BoundsError> {
        if self.bitrate_min == 0 || self.bitrate_max < self.bitrate_min {
            return Err(BoundsError::Bitrate {
                min: self.bitrate_min,
                max: self.bitrate_max,
            });
        }
        if self.fps_min == 0 || self.fps_max < self.fps_min {
            return Err(BoundsError::Fps {
                min: self.fps_min,
                max: self.fps_max,
            });
        }
        if self.bitrate_step == 0 {
            return Err(BoundsError::ZeroStep("BITRATE_STEP"));
        }
        if self.fps_step == 0 {
            return Err(BoundsError::ZeroStep("FPS_STEP"));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_micros(self.cooldown_micros)
    }
}

/// Loss ratios that separate congestion, the dead zone and healthy delivery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Step down when loss is strictly above this (default: 5%)
    pub congested_above: f64,
    /// Step up when loss is strictly below this (default: 1%)
    pub healthy_below: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            congested_above: 0.05,
            healthy_below: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds_are_valid() {
        let bounds = AdaptationBounds::default();
        assert!(bounds.validate().is_ok());
        assert_eq!(bounds.cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_inverted_or_zero_bounds() {
        let mut bounds = AdaptationBounds::default();
        bounds.bitrate_max = bounds.bitrate_min - 1;
        assert!(matches!(bounds.validate(), Err(BoundsError::Bitrate { .. })));

        let mut bounds = AdaptationBounds::default();
        bounds.fps_min = 0;
        assert!(matches!(bounds.validate(), Err(BoundsError::Fps { .. })));

        let mut bounds = AdaptationBounds::default();
        bounds.fps_step = 0;
        assert_eq!(bounds.validate(), Err(BoundsError::ZeroStep("FPS_STEP")));
    }

    #[test]
    fn test_min_equal_max_is_valid() {
        let bounds = AdaptationBounds {
            bitrate_min: 1_000_000,
            bitrate_max: 1_000_000,
            fps_min: 15,
            fps_max: 15,
            ..AdaptationBounds::default()
        };
        assert!(bounds.validate().is_ok());
    }
}
