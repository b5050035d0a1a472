//! Live topology control for the optional processing stage
//!
//! The media graph has a fixed chain `upstream -> [stage] -> downstream`.
//! This crate splices the stage in and out while the pipeline is paused,
//! and reads/writes stage properties against a schema known at compile time.
//!
//! The graph engine itself is a collaborator behind the [`Pipeline`] and
//! [`Element`] traits; `gst-bridge` provides the GStreamer implementation.

mod controller;
mod error;
mod pipeline;
mod property;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use controller::{
    BatchOutcome, StageController, StageReport, StageService, StageUpdate, TopologyState,
};
pub use error::{PropertyError, StateTransitionError, TopologyError};
pub use pipeline::{ChainNeighbors, Element, Pipeline, PipelineState};
pub use property::{PropertyKind, PropertyValue, StageProperty};
