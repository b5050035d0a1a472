//! In-memory pipeline for tests
//!
//! Models a running `stage-in -> stage -> stage-out` chain with pad-like link
//! rules: a `src` feeds at most one `sink` and vice versa. Every state change
//! and link operation is recorded so tests can assert on ordering.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{PropertyError, StateTransitionError};
use crate::pipeline::{ChainNeighbors, Element, Pipeline, PipelineState};
use crate::property::PropertyValue;

pub const UPSTREAM: &str = "stage-in";
pub const STAGE: &str = "stage";
pub const DOWNSTREAM: &str = "stage-out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetState(PipelineState),
    Link(String, String),
    Unlink(String, String),
}

#[derive(Debug)]
struct World {
    state: PipelineState,
    present: BTreeSet<String>,
    links: BTreeSet<(String, String)>,
    props: HashMap<String, PropertyValue>,
    calls: Vec<Call>,
    stalled: Option<PipelineState>,
    refused_links: BTreeSet<(String, String)>,
    unreadable: BTreeSet<String>,
}

impl World {
    fn new() -> Self {
        let present = [UPSTREAM, STAGE, DOWNSTREAM]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let links = [(UPSTREAM, STAGE), (STAGE, DOWNSTREAM)]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();

        let props = [
            ("threshold", PropertyValue::Float(0.01)),
            ("sensitivity", PropertyValue::Float(0.5)),
            ("display", PropertyValue::Bool(true)),
            ("gap", PropertyValue::Int(5)),
            ("gridx", PropertyValue::Int(10)),
            ("gridy", PropertyValue::Int(10)),
            ("minimummotionframes", PropertyValue::Int(1)),
            ("motioncellthickness", PropertyValue::Int(1)),
            ("postallmotion", PropertyValue::Bool(false)),
            ("postnomotion", PropertyValue::Int(0)),
            ("usealpha", PropertyValue::Bool(true)),
            ("cellscolor", PropertyValue::Text("255,255,0".to_string())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            state: PipelineState::Playing,
            present,
            links,
            props,
            calls: Vec::new(),
            stalled: None,
            refused_links: BTreeSet::new(),
            unreadable: BTreeSet::new(),
        }
    }
}

type SharedWorld = Arc<Mutex<World>>;

fn lock(world: &SharedWorld) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    name: String,
    world: SharedWorld,
}

impl Element for FakeElement {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_linked_to(&self, downstream: &Self) -> bool {
        lock(&self.world)
            .links
            .contains(&(self.name.clone(), downstream.name.clone()))
    }

    fn link(&self, downstream: &Self) -> Result<(), String> {
        let mut world = lock(&self.world);
        let pair = (self.name.clone(), downstream.name.clone());
        world.calls.push(Call::Link(pair.0.clone(), pair.1.clone()));

        if world.refused_links.contains(&pair) {
            return Err("link refused".to_string());
        }
        if world.links.iter().any(|(from, _)| *from == pair.0) {
            return Err(format!("{}:src already linked", pair.0));
        }
        if world.links.iter().any(|(_, to)| *to == pair.1) {
            return Err(format!("{}:sink already linked", pair.1));
        }
        world.links.insert(pair);
        Ok(())
    }

    fn unlink(&self, downstream: &Self) -> Result<(), String> {
        let mut world = lock(&self.world);
        let pair = (self.name.clone(), downstream.name.clone());
        world.calls.push(Call::Unlink(pair.0.clone(), pair.1.clone()));

        if world.links.remove(&pair) {
            Ok(())
        } else {
            Err("not linked".to_string())
        }
    }

    fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        let world = lock(&self.world);
        if self.name != STAGE || world.unreadable.contains(name) {
            return Err(PropertyError::ReadFailed {
                name: name.to_string(),
                reason: "not readable".to_string(),
            });
        }
        world
            .props
            .get(name)
            .cloned()
            .ok_or_else(|| PropertyError::Unknown(name.to_string()))
    }

    fn set_property(&self, name: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        let mut world = lock(&self.world);
        if self.name != STAGE || !world.present.contains(STAGE) {
            return Err(PropertyError::WriteFailed {
                name: name.to_string(),
                reason: format!("{} has no such property", self.name),
            });
        }
        world.props.insert(name.to_string(), value.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakePipeline {
    world: SharedWorld,
}

impl Default for FakePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePipeline {
    /// PLAYING pipeline with the stage spliced in
    pub fn new() -> Self {
        Self {
            world: Arc::new(Mutex::new(World::new())),
        }
    }

    fn element(&self, name: &str) -> Option<FakeElement> {
        lock(&self.world).present.contains(name).then(|| FakeElement {
            name: name.to_string(),
            world: Arc::clone(&self.world),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.world).calls.clone()
    }

    pub fn state(&self) -> PipelineState {
        lock(&self.world).state
    }

    pub fn stage_property(&self, name: &str) -> Option<PropertyValue> {
        lock(&self.world).props.get(name).cloned()
    }

    pub fn set_stage_property(&self, name: &str, value: PropertyValue) {
        lock(&self.world).props.insert(name.to_string(), value);
    }

    pub fn is_chain_through_stage(&self) -> bool {
        let world = lock(&self.world);
        world.links.contains(&(UPSTREAM.into(), STAGE.into()))
            && world.links.contains(&(STAGE.into(), DOWNSTREAM.into()))
            && !world.links.contains(&(UPSTREAM.into(), DOWNSTREAM.into()))
    }

    pub fn is_bypassed(&self) -> bool {
        let world = lock(&self.world);
        world.links.contains(&(UPSTREAM.into(), DOWNSTREAM.into()))
            && !world.links.iter().any(|(a, b)| a == STAGE || b == STAGE)
    }

    /// Drop an element from the registry
    pub fn remove_element(&self, name: &str) {
        let mut world = lock(&self.world);
        world.present.remove(name);
        world.links.retain(|(a, b)| a != name && b != name);
    }

    /// Remove a link without recording a call
    pub fn force_unlink(&self, from: &str, to: &str) {
        lock(&self.world)
            .links
            .remove(&(from.to_string(), to.to_string()));
    }

    /// Make transitions to `state` time out
    pub fn stall_state(&self, state: PipelineState) {
        lock(&self.world).stalled = Some(state);
    }

    pub fn fail_link(&self, from: &str, to: &str) {
        lock(&self.world)
            .refused_links
            .insert((from.to_string(), to.to_string()));
    }

    pub fn allow_link(&self, from: &str, to: &str) {
        lock(&self.world)
            .refused_links
            .remove(&(from.to_string(), to.to_string()));
    }

    pub fn break_property_read(&self, name: &str) {
        lock(&self.world).unreadable.insert(name.to_string());
    }
}

impl Pipeline for FakePipeline {
    type Element = FakeElement;

    fn set_state(
        &self,
        state: PipelineState,
        timeout: Duration,
    ) -> Result<(), StateTransitionError> {
        let mut world = lock(&self.world);
        world.calls.push(Call::SetState(state));
        if world.stalled == Some(state) {
            return Err(StateTransitionError::Timeout {
                target: state,
                timeout,
            });
        }
        world.state = state;
        Ok(())
    }

    fn stage(&self) -> Option<FakeElement> {
        self.element(STAGE)
    }

    fn chain_neighbors(&self) -> Option<ChainNeighbors<FakeElement>> {
        Some(ChainNeighbors {
            upstream: self.element(UPSTREAM)?,
            downstream: self.element(DOWNSTREAM)?,
        })
    }
}
