//! GStreamer backend

mod element;
mod encoder;
mod pipeline;
mod probe;

pub use element::GstElement;
pub use encoder::GstEncoder;
pub use pipeline::GstPipeline;
pub use probe::attach_rtcp_probe;

use crate::error::BridgeError;

pub fn init() -> Result<(), BridgeError> {
    gstreamer::init().map_err(|e| BridgeError::Init(e.to_string()))
}
