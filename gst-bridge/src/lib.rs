//! GStreamer side of the video handler
//!
//! Builds the media graph, implements the topology traits from
//! `stage-control` on top of real elements, and feeds RTCP seen by rtpbin
//! into the adaptive controller.
//!
//! Only [`launch`] and [`feedback`] are available without the `gstreamer`
//! feature; they carry no GStreamer types and are unit tested on their own.

mod error;
pub mod feedback;
pub mod launch;

#[cfg(feature = "gstreamer")]
pub mod gst;

pub use error::BridgeError;
pub use feedback::{EncoderControl, FeedbackTap};
pub use launch::{LaunchConfig, RTCP_RECV_PAD, RTCP_SEND_PAD};
