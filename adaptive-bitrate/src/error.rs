use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("Invalid BITRATE_MIN/BITRATE_MAX: min={min} max={max}")]
    Bitrate { min: u32, max: u32 },

    #[error("Invalid FPS_MIN/FPS_MAX: min={min} max={max}")]
    Fps { min: u32, max: u32 },

    #[error("{0} must be greater than zero")]
    ZeroStep(&'static str),
}
