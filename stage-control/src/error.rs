use std::time::Duration;

use thiserror::Error;

use crate::pipeline::PipelineState;
use crate::property::PropertyKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("Unknown property: {0}")]
    Unknown(String),

    #[error("Invalid value for {name}: expected {expected}, got {got}")]
    InvalidValue {
        name: String,
        expected: PropertyKind,
        got: String,
    },

    #[error("Failed to read {name}: {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("Failed to set {name}: {reason}")]
    WriteFailed { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    #[error("Pipeline failed to reach {target}: {reason}")]
    Failed {
        target: PipelineState,
        reason: String,
    },

    #[error("Pipeline did not reach {target} within {timeout:?}")]
    Timeout {
        target: PipelineState,
        timeout: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("stage element not found")]
    StageNotFound,

    #[error("chain neighbor elements not found")]
    NeighborsNotFound,

    #[error("Failed to {action} {from} -> {to}: {reason}")]
    Link {
        action: &'static str,
        from: String,
        to: String,
        reason: String,
    },

    #[error(transparent)]
    State(#[from] StateTransitionError),

    #[error(transparent)]
    Property(#[from] PropertyError),
}
