//! Capabilities - pluggable behaviours attached to item nodes.
//!
//! A capability never touches the graph directly. It reads the graph through a
//! [`GraphView`] and returns [`CapabilityEffect`]s, which the manager applies
//! through its normal entry points so every change is notified and propagated.

mod kinds;

pub use kinds::*;

use indexmap::IndexMap;
use node_rules::{
    CapabilityConfig, CapabilityKind, CapabilitySpec, InteractionData, NodeId, NodeState,
    RelationType, Vec3,
};
use tracing::debug;

use crate::graph::Node;

/// Read-only access to the graph for capabilities.
pub trait GraphView {
    fn node_state(&self, id: &str) -> Option<NodeState>;

    /// IDs of nodes within `radius` of `center`.
    fn node_ids_in_radius(&self, center: Vec3, radius: f32) -> Vec<NodeId>;

    /// Targets of `id`'s outgoing connections of the given relation.
    fn outgoing_targets(&self, id: &str, relation: RelationType) -> Vec<NodeId>;
}

/// Everything a capability may look at while being used.
pub struct CapabilityContext<'a> {
    pub owner: &'a NodeId,
    pub owner_state: NodeState,
    pub owner_position: Vec3,
    pub interaction: &'a InteractionData,
    pub graph: &'a dyn GraphView,
}

/// A change requested by a capability.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityEffect {
    SetNodeState { node: NodeId, state: NodeState },
    /// Raise story events on the owner.
    TriggerEvents(Vec<String>),
    /// Move the instigator somewhere else.
    Teleport { instigator: String, destination: Vec3 },
    /// Text for the player (dialogue, observations, clues).
    Message(String),
}

/// Result of using a capability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapabilityOutcome {
    pub used: bool,
    pub effects: Vec<CapabilityEffect>,
}

impl CapabilityOutcome {
    pub fn unused() -> Self {
        Self::default()
    }

    pub fn used(effects: Vec<CapabilityEffect>) -> Self {
        Self {
            used: true,
            effects,
        }
    }
}

/// Summary of a capability for inspection and snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityInfo {
    pub id: String,
    pub kind: CapabilityKind,
    pub active: bool,
    pub parameters: IndexMap<String, String>,
}

/// State shared by every capability: activation and cooldown.
#[derive(Debug, Clone)]
pub struct CapabilityCore {
    id: String,
    active: bool,
    auto_activate: bool,
    cooldown: f32,
    remaining_cooldown: f32,
}

impl CapabilityCore {
    pub fn new(spec: &CapabilitySpec) -> Self {
        Self {
            id: spec.id.clone(),
            active: false,
            auto_activate: spec.auto_activate,
            cooldown: spec.cooldown.max(0.0),
            remaining_cooldown: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Deactivating also clears any running cooldown.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.remaining_cooldown = 0.0;
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.remaining_cooldown > 0.0
    }

    pub fn remaining_cooldown(&self) -> f32 {
        self.remaining_cooldown
    }

    /// 1.0 when ready, rising from 0.0 while cooling down.
    pub fn cooldown_progress(&self) -> f32 {
        if self.cooldown <= 0.0 {
            return 1.0;
        }
        1.0 - self.remaining_cooldown / self.cooldown
    }

    fn start_cooldown(&mut self) {
        self.remaining_cooldown = self.cooldown;
    }

    fn tick(&mut self, seconds: f32) {
        self.remaining_cooldown = (self.remaining_cooldown - seconds).max(0.0);
    }

    fn ready(&self, owner_state: NodeState) -> bool {
        self.active && owner_state == NodeState::Active && !self.is_on_cooldown()
    }

    fn follow_owner(&mut self, state: NodeState) {
        match state {
            NodeState::Active => {
                if self.auto_activate {
                    self.activate();
                }
            }
            NodeState::Inactive | NodeState::Locked | NodeState::Hidden => self.deactivate(),
            NodeState::Completed => {}
        }
    }
}

/// Behaviour attached to an item node.
pub trait Capability: std::fmt::Debug {
    fn kind(&self) -> CapabilityKind;

    fn core(&self) -> &CapabilityCore;

    fn core_mut(&mut self) -> &mut CapabilityCore;

    /// Kind-specific work once `can_use` has passed and the cooldown started.
    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome;

    fn id(&self) -> &str {
        self.core().id()
    }

    /// Bind to the owner when attached.
    fn initialize(&mut self, owner: &Node) {
        self.core_mut().follow_owner(owner.state());
        debug!(capability = self.id(), node = %owner.id(), "capability initialized");
    }

    /// Kind-specific preconditions on top of the shared readiness checks.
    fn prerequisites_met(&self, _ctx: &CapabilityContext<'_>) -> bool {
        true
    }

    fn can_use(&self, ctx: &CapabilityContext<'_>) -> bool {
        self.core().ready(ctx.owner_state) && self.prerequisites_met(ctx)
    }

    fn use_capability(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        if !self.can_use(ctx) {
            if self.core().is_on_cooldown() {
                debug!(
                    capability = self.id(),
                    remaining = self.core().remaining_cooldown(),
                    "capability still cooling down"
                );
            }
            return CapabilityOutcome::unused();
        }
        self.core_mut().start_cooldown();
        self.apply(ctx)
    }

    fn on_owner_state_changed(&mut self, state: NodeState) {
        self.core_mut().follow_owner(state);
    }

    fn tick(&mut self, seconds: f32) {
        self.core_mut().tick(seconds);
    }

    /// Multiplier this capability applies to its owner's cooldown clock.
    fn time_scale(&self) -> Option<f32> {
        None
    }

    /// Cap on connections incident to the owner, if this capability imposes one.
    fn relationship_limit(&self) -> Option<usize> {
        None
    }

    /// Property keys and threshold for similarity matching, if this capability compares nodes.
    fn similarity_rule(&self) -> Option<(&[String], f32)> {
        None
    }

    /// Kind-specific parameters for inspection.
    fn parameters(&self) -> IndexMap<String, String> {
        IndexMap::new()
    }

    fn info(&self) -> CapabilityInfo {
        let mut parameters = self.parameters();
        parameters.insert(
            "CooldownProgress".into(),
            format!("{:.2}", self.core().cooldown_progress()),
        );
        CapabilityInfo {
            id: self.id().to_string(),
            kind: self.kind(),
            active: self.core().is_active(),
            parameters,
        }
    }
}

/// A capability attached to a node, one variant per kind.
#[derive(Debug)]
pub enum CapabilityBehaviour {
    Spatial(SpatialCapability),
    State(StateCapability),
    Interactive(InteractiveCapability),
    Narrative(NarrativeCapability),
    System(SystemCapability),
    Numerical(NumericalCapability),
}

macro_rules! dispatch {
    ($behaviour:expr, $capability:ident => $body:expr) => {
        match $behaviour {
            CapabilityBehaviour::Spatial($capability) => $body,
            CapabilityBehaviour::State($capability) => $body,
            CapabilityBehaviour::Interactive($capability) => $body,
            CapabilityBehaviour::Narrative($capability) => $body,
            CapabilityBehaviour::System($capability) => $body,
            CapabilityBehaviour::Numerical($capability) => $body,
        }
    };
}

impl Capability for CapabilityBehaviour {
    fn kind(&self) -> CapabilityKind {
        dispatch!(self, c => c.kind())
    }

    fn core(&self) -> &CapabilityCore {
        dispatch!(self, c => c.core())
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        dispatch!(self, c => c.core_mut())
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        dispatch!(self, c => c.apply(ctx))
    }

    fn initialize(&mut self, owner: &Node) {
        dispatch!(self, c => c.initialize(owner))
    }

    fn prerequisites_met(&self, ctx: &CapabilityContext<'_>) -> bool {
        dispatch!(self, c => c.prerequisites_met(ctx))
    }

    fn on_owner_state_changed(&mut self, state: NodeState) {
        dispatch!(self, c => c.on_owner_state_changed(state))
    }

    fn time_scale(&self) -> Option<f32> {
        dispatch!(self, c => c.time_scale())
    }

    fn relationship_limit(&self) -> Option<usize> {
        dispatch!(self, c => c.relationship_limit())
    }

    fn similarity_rule(&self) -> Option<(&[String], f32)> {
        dispatch!(self, c => c.similarity_rule())
    }

    fn parameters(&self) -> IndexMap<String, String> {
        dispatch!(self, c => c.parameters())
    }
}

/// Instantiate the capability described by a spec.
pub fn build(spec: &CapabilitySpec) -> CapabilityBehaviour {
    let core = CapabilityCore::new(spec);
    match &spec.config {
        CapabilityConfig::Spatial(config) => {
            CapabilityBehaviour::Spatial(SpatialCapability::new(core, config.clone()))
        }
        CapabilityConfig::State(config) => {
            CapabilityBehaviour::State(StateCapability::new(core, config.clone()))
        }
        CapabilityConfig::Interactive(config) => {
            CapabilityBehaviour::Interactive(InteractiveCapability::new(core, config.clone()))
        }
        CapabilityConfig::Narrative(config) => {
            CapabilityBehaviour::Narrative(NarrativeCapability::new(core, config.clone()))
        }
        CapabilityConfig::System(config) => {
            CapabilityBehaviour::System(SystemCapability::new(core, config.clone()))
        }
        CapabilityConfig::Numerical(config) => {
            CapabilityBehaviour::Numerical(NumericalCapability::new(core, config.clone()))
        }
    }
}
