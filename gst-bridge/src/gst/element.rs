use gstreamer::glib;
use gstreamer::prelude::*;

use stage_control::{Element, PropertyError, PropertyValue};

/// `gstreamer::Element` behind the topology traits
///
/// Links are always `src` -> `sink` on the elements' static pads.
#[derive(Debug, Clone)]
pub struct GstElement {
    element: gstreamer::Element,
}

impl GstElement {
    pub fn new(element: gstreamer::Element) -> Self {
        Self { element }
    }

    pub fn inner(&self) -> &gstreamer::Element {
        &self.element
    }

    fn pad(&self, name: &str) -> Result<gstreamer::Pad, String> {
        self.element
            .static_pad(name)
            .ok_or_else(|| format!("{} has no {} pad", self.element.name(), name))
    }

    fn writable_spec(&self, name: &str) -> Result<glib::ParamSpec, PropertyError> {
        let spec = self
            .element
            .find_property(name)
            .ok_or_else(|| PropertyError::Unknown(name.to_string()))?;
        if !spec.flags().contains(glib::ParamFlags::WRITABLE) {
            return Err(PropertyError::WriteFailed {
                name: name.to_string(),
                reason: "property is read-only".to_string(),
            });
        }
        Ok(spec)
    }
}

impl Element for GstElement {
    fn name(&self) -> String {
        self.element.name().to_string()
    }

    fn is_linked_to(&self, downstream: &Self) -> bool {
        let (Ok(src), Ok(sink)) = (self.pad("src"), downstream.pad("sink")) else {
            return false;
        };
        src.peer().is_some_and(|peer| peer == sink)
    }

    fn link(&self, downstream: &Self) -> Result<(), String> {
        let src = self.pad("src")?;
        let sink = downstream.pad("sink")?;
        src.link(&sink).map(|_| ()).map_err(|e| format!("{:?}", e))
    }

    fn unlink(&self, downstream: &Self) -> Result<(), String> {
        let src = self.pad("src")?;
        let sink = downstream.pad("sink")?;
        src.unlink(&sink).map_err(|e| e.to_string())
    }

    fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        let spec = self
            .element
            .find_property(name)
            .ok_or_else(|| PropertyError::Unknown(name.to_string()))?;
        if !spec.flags().contains(glib::ParamFlags::READABLE) {
            return Err(PropertyError::ReadFailed {
                name: name.to_string(),
                reason: "property is write-only".to_string(),
            });
        }
        from_glib_value(&self.element.property_value(name)).ok_or_else(|| {
            PropertyError::ReadFailed {
                name: name.to_string(),
                reason: format!("unsupported type {}", spec.value_type()),
            }
        })
    }

    fn set_property(&self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        let spec = self.writable_spec(name)?;
        let converted = to_glib_value(value, spec.value_type()).ok_or_else(|| {
            PropertyError::WriteFailed {
                name: name.to_string(),
                reason: format!("cannot store {} as {}", value, spec.value_type()),
            }
        })?;
        if !in_range(&spec, value) {
            return Err(PropertyError::WriteFailed {
                name: name.to_string(),
                reason: format!("{} is out of range", value),
            });
        }
        self.element.set_property_from_value(name, &converted);
        Ok(())
    }
}

fn from_glib_value(value: &glib::Value) -> Option<PropertyValue> {
    if let Ok(v) = value.get::<bool>() {
        return Some(PropertyValue::Bool(v));
    }
    if let Ok(v) = value.get::<i32>() {
        return Some(PropertyValue::Int(v.into()));
    }
    if let Ok(v) = value.get::<u32>() {
        return Some(PropertyValue::Int(v.into()));
    }
    if let Ok(v) = value.get::<i64>() {
        return Some(PropertyValue::Int(v));
    }
    if let Ok(v) = value.get::<f64>() {
        return Some(PropertyValue::Float(v));
    }
    if let Ok(v) = value.get::<f32>() {
        return Some(PropertyValue::Float(v.into()));
    }
    if let Ok(v) = value.get::<Option<String>>() {
        return Some(PropertyValue::Text(v.unwrap_or_default()));
    }
    None
}

fn to_glib_value(value: &PropertyValue, target: glib::Type) -> Option<glib::Value> {
    match value {
        PropertyValue::Bool(v) if target == glib::Type::BOOL => Some(v.to_value()),
        PropertyValue::Int(v) if target == glib::Type::I32 => i32::try_from(*v).ok().map(|v| v.to_value()),
        PropertyValue::Int(v) if target == glib::Type::U32 => u32::try_from(*v).ok().map(|v| v.to_value()),
        PropertyValue::Int(v) if target == glib::Type::I64 => Some(v.to_value()),
        PropertyValue::Int(v) if target == glib::Type::U64 => u64::try_from(*v).ok().map(|v| v.to_value()),
        PropertyValue::Int(v) if target == glib::Type::F64 => Some((*v as f64).to_value()),
        PropertyValue::Float(v) if target == glib::Type::F64 => Some(v.to_value()),
        PropertyValue::Float(v) if target == glib::Type::F32 => Some((*v as f32).to_value()),
        PropertyValue::Text(v) if target == glib::Type::STRING => Some(v.to_value()),
        _ => None,
    }
}

/// GObject rejects out-of-range numbers with a panic, so check the ParamSpec range first
pub(super) fn in_range(spec: &glib::ParamSpec, value: &PropertyValue) -> bool {
    let number = match value {
        PropertyValue::Int(v) => *v as f64,
        PropertyValue::Float(v) => *v,
        _ => return true,
    };
    let range = if let Some(s) = spec.downcast_ref::<glib::ParamSpecInt>() {
        (s.minimum() as f64, s.maximum() as f64)
    } else if let Some(s) = spec.downcast_ref::<glib::ParamSpecUInt>() {
        (s.minimum() as f64, s.maximum() as f64)
    } else if let Some(s) = spec.downcast_ref::<glib::ParamSpecInt64>() {
        (s.minimum() as f64, s.maximum() as f64)
    } else if let Some(s) = spec.downcast_ref::<glib::ParamSpecUInt64>() {
        (s.minimum() as f64, s.maximum() as f64)
    } else if let Some(s) = spec.downcast_ref::<glib::ParamSpecDouble>() {
        (s.minimum(), s.maximum())
    } else if let Some(s) = spec.downcast_ref::<glib::ParamSpecFloat>() {
        (s.minimum() as f64, s.maximum() as f64)
    } else {
        return true;
    };
    number >= range.0 && number <= range.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_follows_param_spec() {
        let bitrate = glib::ParamSpecUInt::builder("bitrate")
            .minimum(1)
            .maximum(2_048_000)
            .build();
        assert!(in_range(&bitrate, &PropertyValue::Int(4_000)));
        assert!(in_range(&bitrate, &PropertyValue::Int(2_048_000)));
        assert!(!in_range(&bitrate, &PropertyValue::Int(2_048_001)));
        assert!(!in_range(&bitrate, &PropertyValue::Int(0)));

        let threshold = glib::ParamSpecDouble::builder("threshold")
            .minimum(0.0)
            .maximum(1.0)
            .build();
        assert!(in_range(&threshold, &PropertyValue::Float(0.5)));
        assert!(!in_range(&threshold, &PropertyValue::Float(1.5)));

        let display = glib::ParamSpecBoolean::builder("display").build();
        assert!(in_range(&display, &PropertyValue::Bool(true)));
    }
}
