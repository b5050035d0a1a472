//! Startup configuration for the video handler
//!
//! Every setting is a CLI flag that falls back to the environment variable
//! the service has always been configured with.

mod config;
mod error;

pub use config::{HandlerConfig, NetworkConfig};
pub use error::ConfigError;
