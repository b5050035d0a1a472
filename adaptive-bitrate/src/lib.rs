//! Adaptive Bitrate Control for Video Streaming
//!
//! This crate turns RTCP receiver report blocks into bitrate and framerate
//! targets for the encoder. Loss above the congestion threshold steps both
//! down, loss below the healthy threshold steps both up, and anything in
//! between is left alone. Decisions are rate limited by a cooldown.
//!
//! # Components
//!
//! - [`config`]: Adaptation bounds and loss thresholds
//! - [`controller`]: Controller state and the per-block adaptation step
//! - [`shared`]: Lock wrapper shared by the streaming and control threads

mod config;
mod controller;
mod error;
mod shared;

pub use config::{AdaptationBounds, Thresholds};
pub use controller::{AdaptiveController, Adjustment, ControllerState, Direction};
pub use error::BoundsError;
pub use shared::{ControllerSnapshot, SharedController};
