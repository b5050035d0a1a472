//! Stage splicing and property access
//!
//! One mutex guards [`TopologyState`] and is held across the whole
//! pause -> relink -> resume sequence, so concurrent toggles run one after
//! the other and never interleave pad operations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{PropertyError, TopologyError};
use crate::pipeline::{ChainNeighbors, Element, Pipeline, PipelineState};
use crate::property::{PropertyValue, StageProperty};

/// Whether the stage is spliced in, plus the display flag saved across a bypass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyState {
    pub enabled: bool,
    pub display_prev: bool,
    /// `false` when a failed relink could not be rolled back; the next toggle
    /// relinks even if `enabled` already matches
    pub settled: bool,
}

impl Default for TopologyState {
    fn default() -> Self {
        Self {
            enabled: true,
            display_prev: true,
            settled: true,
        }
    }
}

/// One control-plane update: optional toggle plus raw property writes
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    pub enabled: Option<bool>,
    pub properties: Vec<(String, serde_json::Value)>,
}

/// Result of a [`StageUpdate`]
///
/// Property writes are independent: `failed` lists the keys that were not
/// applied while every key in `updated` took effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub toggled: Option<bool>,
    pub updated: BTreeMap<String, PropertyValue>,
    pub failed: BTreeMap<String, PropertyError>,
    pub enabled: bool,
}

/// Snapshot of the reported stage properties
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    /// `None` where the element refused the read
    pub properties: Vec<(StageProperty, Option<PropertyValue>)>,
    pub enabled: bool,
}

/// Object-safe view of a [`StageController`] for the control plane
pub trait StageService: Send + Sync {
    /// Splice the stage in (`true`) or bypass it (`false`); `Ok(false)` when already there
    fn set_stage_enabled(&self, target: bool) -> Result<bool, TopologyError>;

    /// Write one property by name; schema violations come back as [`TopologyError::Property`]
    fn set_property(
        &self,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<PropertyValue, TopologyError>;

    /// Toggle first, then every property; one lock for the whole batch
    fn apply_batch(&self, update: StageUpdate) -> Result<BatchOutcome, TopologyError>;

    fn get_properties(&self) -> Result<StageReport, TopologyError>;

    fn is_enabled(&self) -> bool;
}

pub struct StageController<P: Pipeline> {
    pipeline: P,
    state_timeout: Duration,
    topology: Mutex<TopologyState>,
}

impl<P: Pipeline> StageController<P> {
    /// Create a controller for a pipeline whose stage starts spliced in
    pub fn new(pipeline: P, state_timeout: Duration) -> Self {
        Self {
            pipeline,
            state_timeout,
            topology: Mutex::new(TopologyState::default()),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn topology(&self) -> TopologyState {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, TopologyState> {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self) -> Result<P::Element, TopologyError> {
        self.pipeline.stage().ok_or(TopologyError::StageNotFound)
    }

    /// Write one property through the schema
    fn write_property(
        stage: &P::Element,
        name: &str,
        raw: &serde_json::Value,
    ) -> Result<PropertyValue, PropertyError> {
        let prop: StageProperty = name.parse()?;
        let value = prop.coerce(raw)?;
        stage.set_property(prop.name(), &value)?;
        Ok(value)
    }

    fn toggle_locked(
        &self,
        topology: &mut TopologyState,
        target: bool,
    ) -> Result<bool, TopologyError> {
        if topology.enabled == target && topology.settled {
            return Ok(false);
        }
        let stage = self.stage()?;

        if let Err(e) = self.pipeline.set_state(PipelineState::Paused, self.state_timeout) {
            self.resume();
            return Err(e.into());
        }

        let result = self
            .pipeline
            .chain_neighbors()
            .ok_or(TopologyError::NeighborsNotFound)
            .and_then(|neighbors| transition(&neighbors, &stage, topology, target));

        let resumed = self
            .pipeline
            .set_state(PipelineState::Playing, self.state_timeout);

        if let Err(e) = &result {
            tracing::error!(error = %e, target, "Stage toggle failed");
        }
        if let Err(e) = &resumed {
            tracing::error!(error = %e, "Failed to resume pipeline");
        }
        result?;
        resumed?;

        tracing::info!(enabled = target, "Stage {}", if target { "enabled" } else { "bypassed" });
        Ok(true)
    }

    /// Best-effort return to PLAYING after a failed pause
    fn resume(&self) {
        if let Err(e) = self
            .pipeline
            .set_state(PipelineState::Playing, self.state_timeout)
        {
            tracing::error!(error = %e, "Failed to resume pipeline");
        }
    }
}

/// Relink towards `target`, rolling back to the previous topology on failure
fn transition<E: Element>(
    n: &ChainNeighbors<E>,
    stage: &E,
    topology: &mut TopologyState,
    target: bool,
) -> Result<(), TopologyError> {
    let relinked = if target {
        splice_in(n, stage)
    } else {
        bypass(n, stage)
    };

    if let Err(e) = relinked {
        let rolled_back = if target {
            bypass(n, stage)
        } else {
            splice_in(n, stage)
        };
        match rolled_back {
            Ok(()) => {
                topology.enabled = !target;
                topology.settled = true;
            }
            Err(undo) => {
                tracing::error!(error = %undo, "Failed to roll back stage relink");
                topology.settled = false;
            }
        }
        return Err(e);
    }

    topology.enabled = target;
    topology.settled = true;
    if target {
        let display = PropertyValue::Bool(topology.display_prev);
        if let Err(e) = stage.set_property(StageProperty::Display.name(), &display) {
            tracing::warn!(error = %e, "Failed to restore stage display");
        }
    } else {
        match stage.property(StageProperty::Display.name()) {
            Ok(PropertyValue::Bool(display)) => topology.display_prev = display,
            Ok(other) => tracing::warn!(value = %other, "Stage display is not a boolean"),
            Err(e) => tracing::warn!(error = %e, "Failed to save stage display"),
        }
        if let Err(e) =
            stage.set_property(StageProperty::Display.name(), &PropertyValue::Bool(false))
        {
            tracing::warn!(error = %e, "Failed to mute bypassed stage");
        }
    }
    Ok(())
}

/// upstream -> stage -> downstream
fn splice_in<E: Element>(n: &ChainNeighbors<E>, stage: &E) -> Result<(), TopologyError> {
    unlink_if_linked(&n.upstream, &n.downstream)?;
    link_if_unlinked(&n.upstream, stage)?;
    link_if_unlinked(stage, &n.downstream)
}

/// upstream -> downstream, stage left unlinked
fn bypass<E: Element>(n: &ChainNeighbors<E>, stage: &E) -> Result<(), TopologyError> {
    unlink_if_linked(&n.upstream, stage)?;
    unlink_if_linked(stage, &n.downstream)?;
    link_if_unlinked(&n.upstream, &n.downstream)
}

fn link_if_unlinked<E: Element>(from: &E, to: &E) -> Result<(), TopologyError> {
    if from.is_linked_to(to) {
        return Ok(());
    }
    from.link(to).map_err(|reason| TopologyError::Link {
        action: "link",
        from: from.name(),
        to: to.name(),
        reason,
    })
}

fn unlink_if_linked<E: Element>(from: &E, to: &E) -> Result<(), TopologyError> {
    if !from.is_linked_to(to) {
        return Ok(());
    }
    from.unlink(to).map_err(|reason| TopologyError::Link {
        action: "unlink",
        from: from.name(),
        to: to.name(),
        reason,
    })
}

impl<P: Pipeline> StageService for StageController<P> {
    fn set_stage_enabled(&self, target: bool) -> Result<bool, TopologyError> {
        let mut topology = self.lock();
        self.toggle_locked(&mut topology, target)
    }

    fn set_property(
        &self,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<PropertyValue, TopologyError> {
        let _topology = self.lock();
        let stage = self.stage()?;
        let value = Self::write_property(&stage, name, value)?;
        tracing::debug!(property = %name, %value, "Stage property set");
        Ok(value)
    }

    fn apply_batch(&self, update: StageUpdate) -> Result<BatchOutcome, TopologyError> {
        let mut topology = self.lock();
        let stage = self.stage()?;

        let mut outcome = BatchOutcome::default();
        if let Some(target) = update.enabled {
            if self.toggle_locked(&mut topology, target)? {
                outcome.toggled = Some(target);
            }
        }

        for (name, raw) in &update.properties {
            match Self::write_property(&stage, name, raw) {
                Ok(value) => {
                    tracing::debug!(property = %name, %value, "Stage property set");
                    outcome.updated.insert(name.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(property = %name, error = %e, "Stage property rejected");
                    outcome.failed.insert(name.clone(), e);
                }
            }
        }

        outcome.enabled = topology.enabled;
        Ok(outcome)
    }

    fn get_properties(&self) -> Result<StageReport, TopologyError> {
        let topology = self.lock();
        let stage = self.stage()?;

        let properties = StageProperty::REPORTED
            .iter()
            .map(|prop| (*prop, stage.property(prop.name()).ok()))
            .collect();

        Ok(StageReport {
            properties,
            enabled: topology.enabled,
        })
    }

    fn is_enabled(&self) -> bool {
        self.lock().enabled
    }
}
