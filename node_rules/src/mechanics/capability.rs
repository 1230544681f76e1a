//! Capability configuration - the six fixed kinds of behaviour an item node can carry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entities::{NodeId, NodeState, Vec3};

/// The kinds of capability an item node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Spatial,
    State,
    Interactive,
    Narrative,
    System,
    Numerical,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 6] = [
        CapabilityKind::Spatial,
        CapabilityKind::State,
        CapabilityKind::Interactive,
        CapabilityKind::Narrative,
        CapabilityKind::System,
        CapabilityKind::Numerical,
    ];

    /// Case-insensitive parse. Unknown kinds have no fallback.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spatial" => Some(CapabilityKind::Spatial),
            "state" => Some(CapabilityKind::State),
            "interactive" => Some(CapabilityKind::Interactive),
            "narrative" => Some(CapabilityKind::Narrative),
            "system" => Some(CapabilityKind::System),
            "numerical" => Some(CapabilityKind::Numerical),
            _ => None,
        }
    }

    /// Lowercase name as used in descriptors.
    pub fn key(self) -> &'static str {
        match self {
            CapabilityKind::Spatial => "spatial",
            CapabilityKind::State => "state",
            CapabilityKind::Interactive => "interactive",
            CapabilityKind::Narrative => "narrative",
            CapabilityKind::System => "system",
            CapabilityKind::Numerical => "numerical",
        }
    }
}

/// Containment and teleport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub can_contain_nodes: bool,
    pub max_contained_nodes: usize,
    pub teleport_destination: Option<Vec3>,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            can_contain_nodes: true,
            max_contained_nodes: 5,
            teleport_destination: None,
        }
    }
}

/// State cycling and broadcast settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// States the owner cycles through on use.
    pub possible_states: Vec<NodeState>,
    /// Radius in which `affected_state` is applied to other nodes; zero disables it.
    pub state_change_radius: f32,
    /// State pushed onto nodes within the radius when used.
    pub affected_state: Option<NodeState>,
    /// Explicit nodes whose state follows `affected_state`.
    pub target_node_ids: Vec<NodeId>,
    pub propagate_through_dependency: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            possible_states: vec![NodeState::Active, NodeState::Inactive, NodeState::Completed],
            state_change_radius: 500.0,
            affected_state: None,
            target_node_ids: Vec::new(),
            propagate_through_dependency: true,
        }
    }
}

/// Dialogue and observation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractiveConfig {
    pub dialogue_options: Vec<String>,
    pub observable_info: Vec<String>,
    pub givable_items: Vec<String>,
    pub max_interaction_attempts: u32,
    /// Property keys compared when matching the owner against another node.
    pub comparison_keys: Vec<String>,
    /// Fraction of matching keys needed to call two nodes similar.
    pub comparison_threshold: f32,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            dialogue_options: Vec::new(),
            observable_info: Vec::new(),
            givable_items: Vec::new(),
            max_interaction_attempts: 3,
            comparison_keys: Vec::new(),
            comparison_threshold: 0.8,
        }
    }
}

/// Story progression and clue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub story_progression_path: Vec<String>,
    pub available_clues: Vec<String>,
    pub max_clues_per_interaction: usize,
    pub max_memory_count: usize,
    pub triggerable_event_ids: Vec<String>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            story_progression_path: Vec::new(),
            available_clues: Vec::new(),
            max_clues_per_interaction: 1,
            max_memory_count: 10,
            triggerable_event_ids: Vec::new(),
        }
    }
}

/// Rule evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub time_scale: f32,
    /// Node ID to required state; all must hold for the rule set to fire.
    pub condition_rules: IndexMap<NodeId, NodeState>,
    /// Events raised on the owner when the rules hold.
    pub events_on_satisfied: Vec<String>,
    pub max_relationships: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            condition_rules: IndexMap::new(),
            events_on_satisfied: Vec::new(),
            max_relationships: 10,
        }
    }
}

/// Player resource settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericalConfig {
    pub player_max_health: f32,
    pub max_mental_state: f32,
    pub health_restore: f32,
    pub mental_restore: f32,
    pub resource_pools: IndexMap<String, f32>,
}

impl Default for NumericalConfig {
    fn default() -> Self {
        Self {
            player_max_health: 100.0,
            max_mental_state: 100.0,
            health_restore: 20.0,
            mental_restore: 15.0,
            resource_pools: IndexMap::new(),
        }
    }
}

/// Configuration for one capability, one variant per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CapabilityConfig {
    Spatial(SpatialConfig),
    State(StateConfig),
    Interactive(InteractiveConfig),
    Narrative(NarrativeConfig),
    System(SystemConfig),
    Numerical(NumericalConfig),
}

impl CapabilityConfig {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityConfig::Spatial(_) => CapabilityKind::Spatial,
            CapabilityConfig::State(_) => CapabilityKind::State,
            CapabilityConfig::Interactive(_) => CapabilityKind::Interactive,
            CapabilityConfig::Narrative(_) => CapabilityKind::Narrative,
            CapabilityConfig::System(_) => CapabilityKind::System,
            CapabilityConfig::Numerical(_) => CapabilityKind::Numerical,
        }
    }

    /// The default configuration for a kind.
    pub fn default_for(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Spatial => CapabilityConfig::Spatial(SpatialConfig::default()),
            CapabilityKind::State => CapabilityConfig::State(StateConfig::default()),
            CapabilityKind::Interactive => {
                CapabilityConfig::Interactive(InteractiveConfig::default())
            }
            CapabilityKind::Narrative => CapabilityConfig::Narrative(NarrativeConfig::default()),
            CapabilityKind::System => CapabilityConfig::System(SystemConfig::default()),
            CapabilityKind::Numerical => CapabilityConfig::Numerical(NumericalConfig::default()),
        }
    }
}

/// A capability to attach to an item node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub id: String,
    pub auto_activate: bool,
    /// Seconds before the capability can be used again.
    pub cooldown: f32,
    pub config: CapabilityConfig,
}

impl CapabilitySpec {
    /// Create a spec with the conventional `<kind>_capability` ID.
    pub fn new(config: CapabilityConfig) -> Self {
        Self {
            id: format!("{}_capability", config.kind().key()),
            auto_activate: true,
            cooldown: 0.0,
            config,
        }
    }

    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = seconds.max(0.0);
        self
    }

    pub fn with_auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }

    pub fn kind(&self) -> CapabilityKind {
        self.config.kind()
    }
}
