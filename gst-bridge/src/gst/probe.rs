use gstreamer::prelude::*;

use crate::error::BridgeError;
use crate::feedback::FeedbackTap;

/// Attach `tap` to a request pad of `rtpbin` that already exists
pub fn attach_rtcp_probe(
    rtpbin: &gstreamer::Element,
    pad_name: &str,
    tap: FeedbackTap,
) -> Result<gstreamer::PadProbeId, BridgeError> {
    let pad = rtpbin.static_pad(pad_name).ok_or_else(|| BridgeError::MissingPad {
        element: rtpbin.name().to_string(),
        pad: pad_name.to_string(),
    })?;

    let pad_label = pad_name.to_string();
    pad.add_probe(gstreamer::PadProbeType::BUFFER, move |_pad, info| {
        let Some(buffer) = info.buffer() else {
            return gstreamer::PadProbeReturn::Ok;
        };
        match buffer.map_readable() {
            Ok(map) => {
                tap.on_buffer(map.as_slice());
            }
            Err(_) => tracing::warn!(pad = %pad_label, "[RTCP] unable to map buffer"),
        }
        gstreamer::PadProbeReturn::Ok
    })
    .ok_or_else(|| BridgeError::MissingPad {
        element: rtpbin.name().to_string(),
        pad: format!("{} (probe refused)", pad_name),
    })
}
