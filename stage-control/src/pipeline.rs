//! Collaborator seams for the media graph engine

use std::fmt;
use std::time::Duration;

use crate::error::{PropertyError, StateTransitionError};
use crate::property::PropertyValue;

/// Pipeline-wide state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Null,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Null => f.write_str("NULL"),
            PipelineState::Paused => f.write_str("PAUSED"),
            PipelineState::Playing => f.write_str("PLAYING"),
        }
    }
}

/// Handle to one element of the graph
///
/// Links always go from this element's `src` pad to the other element's
/// `sink` pad. Property access is by name; typing happens one layer up in
/// [`StageProperty`](crate::StageProperty).
pub trait Element: Clone + Send + Sync + 'static {
    fn name(&self) -> String;

    /// Whether our `src` pad currently feeds `downstream`'s `sink` pad
    fn is_linked_to(&self, downstream: &Self) -> bool;

    fn link(&self, downstream: &Self) -> Result<(), String>;

    fn unlink(&self, downstream: &Self) -> Result<(), String>;

    fn property(&self, name: &str) -> Result<PropertyValue, PropertyError>;

    fn set_property(&self, name: &str, value: &PropertyValue) -> Result<(), PropertyError>;
}

/// The two fixed elements around the optional stage
#[derive(Debug, Clone)]
pub struct ChainNeighbors<E> {
    pub upstream: E,
    pub downstream: E,
}

/// Running pipeline owned by the collaborator
///
/// Lookups go through a registry the collaborator sets up when it builds the
/// graph; `None` means the element is not (or no longer) part of it.
pub trait Pipeline: Send + Sync + 'static {
    type Element: Element;

    /// Request `state` and wait at most `timeout` for the transition
    fn set_state(&self, state: PipelineState, timeout: Duration)
        -> Result<(), StateTransitionError>;

    fn stage(&self) -> Option<Self::Element>;

    fn chain_neighbors(&self) -> Option<ChainNeighbors<Self::Element>>;
}
