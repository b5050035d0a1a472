use std::time::Duration;

use adaptive_bitrate::AdaptationBounds;
use clap::{ArgAction, Parser};

use crate::error::ConfigError;

#[derive(Debug, Clone, Parser)]
#[command(name = "video-handler")]
#[command(about = "RTP to RTSP video handler with adaptive bitrate and a switchable motion stage")]
pub struct HandlerConfig {
    /// Host receiving our RTCP reports
    #[arg(long, env = "CAMERA_IP", default_value = "localhost")]
    pub camera_ip: String,

    /// Inbound RTP (H.264, payload 96)
    #[arg(long, env = "RTP_PORT", default_value_t = 5000)]
    pub rtp_port: u32,

    /// Inbound RTCP
    #[arg(long, env = "RTCP_IN", default_value_t = 5001)]
    pub rtcp_in: u32,

    /// Outbound RTCP on the camera host
    #[arg(long, env = "RTCP_OUT", default_value_t = 5005)]
    pub rtcp_out: u32,

    /// Where the processed stream is published
    #[arg(long, env = "RTSP_LOCATION", default_value = "rtsp://localhost:8554/stream")]
    pub rtsp_location: String,

    /// Control-plane HTTP port
    #[arg(long, env = "API_PORT", default_value_t = 7070)]
    pub api_port: u32,

    #[arg(long, env = "BITRATE_MIN", default_value_t = 500_000)]
    pub bitrate_min: u32,

    #[arg(long, env = "BITRATE_MAX", default_value_t = 4_000_000)]
    pub bitrate_max: u32,

    #[arg(long, env = "BITRATE_STEP", default_value_t = 250_000)]
    pub bitrate_step: u32,

    #[arg(long, env = "FPS_MIN", default_value_t = 10)]
    pub fps_min: u32,

    #[arg(long, env = "FPS_MAX", default_value_t = 30)]
    pub fps_max: u32,

    #[arg(long, env = "FPS_STEP", default_value_t = 5)]
    pub fps_step: u32,

    /// Minimum time between two adaptation steps, in microseconds
    #[arg(long, env = "ADAPT_COOLDOWN_US", default_value_t = 5_000_000)]
    pub adapt_cooldown_us: u64,

    /// Push computed targets onto the encoder instead of only logging them
    #[arg(long, env = "ADAPT_APPLY", default_value_t = true, action = ArgAction::Set)]
    pub adapt_apply: bool,

    /// Bound on each pause/resume wait when toggling the stage
    #[arg(long, env = "STATE_CHANGE_TIMEOUT_MS", default_value_t = 5000)]
    pub state_change_timeout_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Reported by the health endpoint
    #[arg(long = "service-version", env = "VERSION", default_value = "unknown")]
    pub service_version: String,
}

/// Validated network endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub camera_ip: String,
    pub rtp_port: u16,
    pub rtcp_in: u16,
    pub rtcp_out: u16,
    pub api_port: u16,
    pub rtsp_location: String,
}

impl HandlerConfig {
    /// Parse flags and environment
    pub fn load() -> Self {
        Self::parse()
    }

    /// Check everything once, before anything is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network()?;
        self.bounds()?;
        Ok(())
    }

    pub fn network(&self) -> Result<NetworkConfig, ConfigError> {
        if self.camera_ip.trim().is_empty() {
            return Err(ConfigError::Invalid("CAMERA_IP must not be empty".to_string()));
        }
        if self.rtsp_location.trim().is_empty() {
            return Err(ConfigError::Invalid("RTSP_LOCATION must not be empty".to_string()));
        }

        Ok(NetworkConfig {
            camera_ip: self.camera_ip.clone(),
            rtp_port: port("RTP_PORT", self.rtp_port)?,
            rtcp_in: port("RTCP_IN", self.rtcp_in)?,
            rtcp_out: port("RTCP_OUT", self.rtcp_out)?,
            api_port: port("API_PORT", self.api_port)?,
            rtsp_location: self.rtsp_location.clone(),
        })
    }

    pub fn bounds(&self) -> Result<AdaptationBounds, ConfigError> {
        let bounds = AdaptationBounds {
            bitrate_min: self.bitrate_min,
            bitrate_max: self.bitrate_max,
            bitrate_step: self.bitrate_step,
            fps_min: self.fps_min,
            fps_max: self.fps_max,
            fps_step: self.fps_step,
            cooldown_micros: self.adapt_cooldown_us,
        };
        bounds
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(bounds)
    }

    pub fn state_change_timeout(&self) -> Duration {
        Duration::from_millis(self.state_change_timeout_ms)
    }

    /// `LOG_LEVEL` as an `EnvFilter` directive
    pub fn log_filter(&self) -> String {
        self.log_level.trim().to_lowercase()
    }
}

fn port(name: &str, value: u32) -> Result<u16, ConfigError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::Invalid(format!("{} must be in 1..=65535, got {}", name, value)))
}
