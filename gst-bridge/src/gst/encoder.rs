use gstreamer::prelude::*;
use stage_control::PropertyValue;

use super::element::in_range;
use crate::error::BridgeError;
use crate::feedback::EncoderControl;
use crate::launch::{encoder_kbps, names};

/// x264enc bitrate and videorate max-rate
#[derive(Debug, Clone)]
pub struct GstEncoder {
    encoder: gstreamer::Element,
    rate: gstreamer::Element,
}

impl GstEncoder {
    pub fn new(encoder: gstreamer::Element, rate: gstreamer::Element) -> Self {
        Self { encoder, rate }
    }
}

impl EncoderControl for GstEncoder {
    fn set_bitrate(&self, bits_per_second: u32) -> Result<(), BridgeError> {
        let kbps = encoder_kbps(bits_per_second);
        check_range(&self.encoder, "bitrate", i64::from(kbps))?;
        self.encoder.set_property("bitrate", kbps);
        tracing::debug!(kbps, "Encoder bitrate applied");
        Ok(())
    }

    fn set_fps(&self, fps: u32) -> Result<(), BridgeError> {
        let max_rate = i32::try_from(fps).map_err(|_| BridgeError::Property {
            element: names::RATE.to_string(),
            property: "max-rate",
            reason: format!("{} does not fit a gint", fps),
        })?;
        check_range(&self.rate, "max-rate", i64::from(max_rate))?;
        self.rate.set_property("max-rate", max_rate);
        tracing::debug!(fps, "Frame rate cap applied");
        Ok(())
    }
}

/// GObject panics on out-of-range writes
fn check_range(
    element: &gstreamer::Element,
    property: &'static str,
    value: i64,
) -> Result<(), BridgeError> {
    let error = |reason: String| BridgeError::Property {
        element: element.name().to_string(),
        property,
        reason,
    };
    let spec = element
        .find_property(property)
        .ok_or_else(|| error("no such property".to_string()))?;
    if !in_range(&spec, &PropertyValue::Int(value)) {
        return Err(error(format!("{} is out of range", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_rejects_values_outside_param_spec() {
        gstreamer::init().expect("gst init");
        let identity = gstreamer::ElementFactory::make("identity")
            .build()
            .expect("identity");

        assert!(check_range(&identity, "sleep-time", 10).is_ok());
        assert!(matches!(
            check_range(&identity, "sleep-time", -1),
            Err(BridgeError::Property { property: "sleep-time", .. })
        ));
        assert!(check_range(&identity, "bogus", 1).is_err());
    }
}
