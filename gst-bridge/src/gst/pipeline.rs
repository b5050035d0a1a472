use std::time::Duration;

use gstreamer::prelude::*;

use stage_control::{ChainNeighbors, Pipeline, PipelineState, StateTransitionError};

use crate::error::BridgeError;
use crate::gst::element::GstElement;
use crate::launch::names;

/// Running GStreamer pipeline plus the elements resolved at build time
#[derive(Debug, Clone)]
pub struct GstPipeline {
    pipeline: gstreamer::Pipeline,
    stage: Option<GstElement>,
    upstream: Option<GstElement>,
    downstream: Option<GstElement>,
}

impl GstPipeline {
    /// Parse a launch description and resolve the stage chain by name
    pub fn launch(description: &str) -> Result<Self, BridgeError> {
        let element = gstreamer::parse::launch(description)
            .map_err(|e| BridgeError::Launch(e.to_string()))?;
        let pipeline = element
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| BridgeError::NotAPipeline)?;
        Ok(Self::from_pipeline(pipeline))
    }

    pub fn from_pipeline(pipeline: gstreamer::Pipeline) -> Self {
        let lookup = |name: &'static str| {
            let found = pipeline.by_name(name).map(GstElement::new);
            if found.is_none() {
                tracing::warn!(element = name, "Element missing from pipeline");
            }
            found
        };

        Self {
            stage: lookup(names::STAGE),
            upstream: lookup(names::UPSTREAM),
            downstream: lookup(names::DOWNSTREAM),
            pipeline,
        }
    }

    pub fn inner(&self) -> &gstreamer::Pipeline {
        &self.pipeline
    }

    pub fn element(&self, name: &'static str) -> Result<gstreamer::Element, BridgeError> {
        self.pipeline
            .by_name(name)
            .ok_or(BridgeError::MissingElement(name))
    }

    /// Fire-and-forget state request, used for startup and shutdown
    pub fn request_state(&self, state: PipelineState) -> Result<(), BridgeError> {
        self.pipeline
            .set_state(to_gst(state))
            .map(|_| ())
            .map_err(|e| BridgeError::StateChange(format!("{} ({})", e, state)))
    }
}

fn to_gst(state: PipelineState) -> gstreamer::State {
    match state {
        PipelineState::Null => gstreamer::State::Null,
        PipelineState::Paused => gstreamer::State::Paused,
        PipelineState::Playing => gstreamer::State::Playing,
    }
}

impl Pipeline for GstPipeline {
    type Element = GstElement;

    fn set_state(
        &self,
        state: PipelineState,
        timeout: Duration,
    ) -> Result<(), StateTransitionError> {
        self.pipeline
            .set_state(to_gst(state))
            .map_err(|e| StateTransitionError::Failed {
                target: state,
                reason: e.to_string(),
            })?;

        let (result, current, pending) = self.pipeline.state(wait_time(timeout));
        match result {
            Ok(gstreamer::StateChangeSuccess::Async) => {
                tracing::warn!(?current, ?pending, "Pipeline state change still pending");
                Err(StateTransitionError::Timeout {
                    target: state,
                    timeout,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => Err(StateTransitionError::Failed {
                target: state,
                reason: format!("{} (now {:?})", e, current),
            }),
        }
    }

    fn stage(&self) -> Option<GstElement> {
        self.stage.clone()
    }

    fn chain_neighbors(&self) -> Option<ChainNeighbors<GstElement>> {
        Some(ChainNeighbors {
            upstream: self.upstream.clone()?,
            downstream: self.downstream.clone()?,
        })
    }
}

/// `ClockTime::NONE` means "wait forever", so long timeouts stop at `ClockTime::MAX`
fn wait_time(timeout: Duration) -> gstreamer::ClockTime {
    u64::try_from(timeout.as_nanos())
        .ok()
        .filter(|nanos| *nanos <= gstreamer::ClockTime::MAX.nseconds())
        .map_or(gstreamer::ClockTime::MAX, gstreamer::ClockTime::from_nseconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_time_is_bounded() {
        assert_eq!(
            wait_time(Duration::from_millis(5000)),
            gstreamer::ClockTime::from_mseconds(5000)
        );
        assert_eq!(wait_time(Duration::MAX), gstreamer::ClockTime::MAX);
        assert_eq!(
            wait_time(Duration::from_millis(u64::MAX)),
            gstreamer::ClockTime::MAX
        );
    }
}
