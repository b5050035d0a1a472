//! Stage property schema
//!
//! The stage is a `motioncells` element. Names below are its GObject property
//! names; anything else is rejected before it reaches the element.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PropertyError;

/// Value type of a stage property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    Text,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Bool => f.write_str("boolean"),
            PropertyKind::Int => f.write_str("integer"),
            PropertyKind::Float => f.write_str("number"),
            PropertyKind::Text => f.write_str("string"),
        }
    }
}

/// Dynamically typed property value, serialized as a bare JSON scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Text(_) => PropertyKind::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Known stage properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageProperty {
    Threshold,
    Sensitivity,
    Display,
    Gap,
    GridX,
    GridY,
    MinimumMotionFrames,
    MotionCellThickness,
    PostAllMotion,
    PostNoMotion,
    UseAlpha,
    CellsColor,
    CalculateMotion,
    MotionCellsIdx,
    MotionMaskCoords,
    MotionMaskCellsPos,
}

impl StageProperty {
    /// Properties reported by a stage config read, in response order
    pub const REPORTED: [StageProperty; 12] = [
        StageProperty::Threshold,
        StageProperty::Sensitivity,
        StageProperty::Display,
        StageProperty::Gap,
        StageProperty::GridX,
        StageProperty::GridY,
        StageProperty::MinimumMotionFrames,
        StageProperty::MotionCellThickness,
        StageProperty::PostAllMotion,
        StageProperty::PostNoMotion,
        StageProperty::UseAlpha,
        StageProperty::CellsColor,
    ];

    const ALL: [StageProperty; 16] = [
        StageProperty::Threshold,
        StageProperty::Sensitivity,
        StageProperty::Display,
        StageProperty::Gap,
        StageProperty::GridX,
        StageProperty::GridY,
        StageProperty::MinimumMotionFrames,
        StageProperty::MotionCellThickness,
        StageProperty::PostAllMotion,
        StageProperty::PostNoMotion,
        StageProperty::UseAlpha,
        StageProperty::CellsColor,
        StageProperty::CalculateMotion,
        StageProperty::MotionCellsIdx,
        StageProperty::MotionMaskCoords,
        StageProperty::MotionMaskCellsPos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageProperty::Threshold => "threshold",
            StageProperty::Sensitivity => "sensitivity",
            StageProperty::Display => "display",
            StageProperty::Gap => "gap",
            StageProperty::GridX => "gridx",
            StageProperty::GridY => "gridy",
            StageProperty::MinimumMotionFrames => "minimummotionframes",
            StageProperty::MotionCellThickness => "motioncellthickness",
            StageProperty::PostAllMotion => "postallmotion",
            StageProperty::PostNoMotion => "postnomotion",
            StageProperty::UseAlpha => "usealpha",
            StageProperty::CellsColor => "cellscolor",
            StageProperty::CalculateMotion => "calculatemotion",
            StageProperty::MotionCellsIdx => "motioncellsidx",
            StageProperty::MotionMaskCoords => "motionmaskcoords",
            StageProperty::MotionMaskCellsPos => "motionmaskcellspos",
        }
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            StageProperty::Threshold | StageProperty::Sensitivity => PropertyKind::Float,
            StageProperty::Display
            | StageProperty::PostAllMotion
            | StageProperty::UseAlpha
            | StageProperty::CalculateMotion => PropertyKind::Bool,
            StageProperty::Gap
            | StageProperty::GridX
            | StageProperty::GridY
            | StageProperty::MinimumMotionFrames
            | StageProperty::MotionCellThickness
            | StageProperty::PostNoMotion => PropertyKind::Int,
            StageProperty::CellsColor
            | StageProperty::MotionCellsIdx
            | StageProperty::MotionMaskCoords
            | StageProperty::MotionMaskCellsPos => PropertyKind::Text,
        }
    }

    /// Convert a JSON value into this property's type
    ///
    /// Integers are accepted for float properties; nothing else is coerced.
    pub fn coerce(&self, raw: &serde_json::Value) -> Result<PropertyValue, PropertyError> {
        use serde_json::Value;

        let value = match (self.kind(), raw) {
            (PropertyKind::Bool, Value::Bool(b)) => Some(PropertyValue::Bool(*b)),
            (PropertyKind::Int, Value::Number(n)) => n.as_i64().map(PropertyValue::Int),
            (PropertyKind::Float, Value::Number(n)) => n.as_f64().map(PropertyValue::Float),
            (PropertyKind::Text, Value::String(s)) => Some(PropertyValue::Text(s.clone())),
            _ => None,
        };

        value.ok_or_else(|| PropertyError::InvalidValue {
            name: self.name().to_string(),
            expected: self.kind(),
            got: raw.to_string(),
        })
    }
}

impl FromStr for StageProperty {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| PropertyError::Unknown(s.to_string()))
    }
}

impl fmt::Display for StageProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        for prop in StageProperty::ALL {
            assert_eq!(prop.name().parse::<StageProperty>(), Ok(prop));
        }
        assert_eq!(
            "bogus".parse::<StageProperty>(),
            Err(PropertyError::Unknown("bogus".to_string()))
        );
    }

    #[test]
    fn test_coerce() {
        assert_eq!(
            StageProperty::Threshold.coerce(&json!(1)),
            Ok(PropertyValue::Float(1.0))
        );
        assert_eq!(
            StageProperty::GridX.coerce(&json!(12)),
            Ok(PropertyValue::Int(12))
        );
        assert_eq!(
            StageProperty::Display.coerce(&json!(false)),
            Ok(PropertyValue::Bool(false))
        );
        assert!(matches!(
            StageProperty::GridX.coerce(&json!(1.5)),
            Err(PropertyError::InvalidValue { .. })
        ));
        assert!(matches!(
            StageProperty::Display.coerce(&json!("yes")),
            Err(PropertyError::InvalidValue { .. })
        ));
        assert!(StageProperty::CellsColor.coerce(&json!(null)).is_err());
    }

    #[test]
    fn test_value_serializes_as_scalar() {
        let values = vec![
            PropertyValue::Bool(true),
            PropertyValue::Int(3),
            PropertyValue::Float(0.5),
            PropertyValue::Text("255,0,0".to_string()),
        ];
        let encoded = serde_json::to_value(&values).expect("serialize");
        assert_eq!(encoded, json!([true, 3, 0.5, "255,0,0"]));
    }
}
