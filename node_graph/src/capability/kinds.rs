//! The six capability kinds.

use indexmap::IndexMap;
use node_rules::{
    CapabilityKind, InteractionKind, InteractiveConfig, NarrativeConfig, NodeId, NodeState,
    NumericalConfig, RelationType, SpatialConfig, StateConfig, SystemConfig,
};
use std::collections::VecDeque;
use tracing::debug;

use super::{Capability, CapabilityContext, CapabilityCore, CapabilityEffect, CapabilityOutcome};
use crate::graph::Node;

/// Distance band width used to pick observation detail.
const OBSERVATION_BAND: f32 = 250.0;

/// Containment and teleportation.
#[derive(Debug)]
pub struct SpatialCapability {
    core: CapabilityCore,
    config: SpatialConfig,
    contained: Vec<NodeId>,
}

impl SpatialCapability {
    pub fn new(core: CapabilityCore, config: SpatialConfig) -> Self {
        Self {
            core,
            config,
            contained: Vec::new(),
        }
    }

    pub fn contained_nodes(&self) -> &[NodeId] {
        &self.contained
    }

    fn is_full(&self) -> bool {
        self.config.can_contain_nodes && self.contained.len() >= self.config.max_contained_nodes
    }
}

impl Capability for SpatialCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Spatial
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn prerequisites_met(&self, _ctx: &CapabilityContext<'_>) -> bool {
        !self.is_full()
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        let interaction = ctx.interaction;
        match interaction.kind {
            InteractionKind::Click => {
                match (&interaction.instigator, self.config.teleport_destination) {
                    (Some(instigator), Some(destination)) => {
                        CapabilityOutcome::used(vec![CapabilityEffect::Teleport {
                            instigator: instigator.clone(),
                            destination,
                        }])
                    }
                    _ => CapabilityOutcome::unused(),
                }
            }
            // Dragging a node onto a container stores it out of sight.
            InteractionKind::Drag if self.config.can_contain_nodes => {
                let Some(stored) = interaction.context_value("ContainedNode") else {
                    return CapabilityOutcome::unused();
                };
                let stored = NodeId::from(stored);
                if &stored == ctx.owner
                    || self.contained.contains(&stored)
                    || ctx.graph.node_state(&stored).is_none()
                {
                    return CapabilityOutcome::unused();
                }
                self.contained.push(stored.clone());
                CapabilityOutcome::used(vec![
                    CapabilityEffect::SetNodeState {
                        node: stored.clone(),
                        state: NodeState::Hidden,
                    },
                    CapabilityEffect::Message(format!("Stored {}", stored)),
                ])
            }
            _ => CapabilityOutcome::unused(),
        }
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert("ContainedCount".into(), self.contained.len().to_string());
        parameters.insert(
            "MaxContainedNodes".into(),
            self.config.max_contained_nodes.to_string(),
        );
        parameters
    }
}

/// Cycles the owner through a list of states and pushes a state onto nearby nodes.
#[derive(Debug)]
pub struct StateCapability {
    core: CapabilityCore,
    config: StateConfig,
    current: NodeState,
}

impl StateCapability {
    pub fn new(core: CapabilityCore, config: StateConfig) -> Self {
        Self {
            core,
            config,
            current: NodeState::Inactive,
        }
    }

    fn next_state(&self) -> Option<NodeState> {
        let states = &self.config.possible_states;
        if states.is_empty() {
            return None;
        }
        let next = states
            .iter()
            .position(|s| *s == self.current)
            .map_or(0, |index| (index + 1) % states.len());
        Some(states[next])
    }

    fn affected_nodes(&self, ctx: &CapabilityContext<'_>) -> Vec<NodeId> {
        let mut affected: Vec<NodeId> = self.config.target_node_ids.clone();

        if self.config.state_change_radius > 0.0 {
            affected.extend(
                ctx.graph
                    .node_ids_in_radius(ctx.owner_position, self.config.state_change_radius),
            );
        }
        if self.config.propagate_through_dependency {
            affected.extend(ctx.graph.outgoing_targets(ctx.owner, RelationType::Dependency));
        }

        let mut unique = Vec::with_capacity(affected.len());
        for id in affected {
            if &id != ctx.owner && !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }
}

impl Capability for StateCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::State
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn initialize(&mut self, owner: &Node) {
        self.core.follow_owner(owner.state());
        self.current = owner.state();
        debug!(capability = self.id(), node = %owner.id(), "state capability initialized");
    }

    fn prerequisites_met(&self, _ctx: &CapabilityContext<'_>) -> bool {
        !self.config.possible_states.is_empty()
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        let Some(next) = self.next_state() else {
            return CapabilityOutcome::unused();
        };

        let mut effects = vec![CapabilityEffect::SetNodeState {
            node: ctx.owner.clone(),
            state: next,
        }];
        if let Some(state) = self.config.affected_state {
            effects.extend(
                self.affected_nodes(ctx)
                    .into_iter()
                    .map(|node| CapabilityEffect::SetNodeState { node, state }),
            );
        }

        self.current = next;
        CapabilityOutcome::used(effects)
    }

    fn on_owner_state_changed(&mut self, state: NodeState) {
        self.core.follow_owner(state);
        self.current = state;
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert("CurrentState".into(), self.current.to_string());
        parameters
    }
}

/// Dialogue, observation and item hand-over.
#[derive(Debug)]
pub struct InteractiveCapability {
    core: CapabilityCore,
    config: InteractiveConfig,
    attempts: u32,
    dialogue_index: usize,
}

impl InteractiveCapability {
    pub fn new(core: CapabilityCore, config: InteractiveConfig) -> Self {
        Self {
            core,
            config,
            attempts: 0,
            dialogue_index: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn observation(&self, ctx: &CapabilityContext<'_>) -> Option<String> {
        let info = &self.config.observable_info;
        if info.is_empty() {
            return None;
        }
        // Entries are ordered from closest to farthest detail.
        let band = ctx
            .interaction
            .instigator_position
            .map(|p| (p.distance(&ctx.owner_position) / OBSERVATION_BAND) as usize)
            .unwrap_or(0);
        info.get(band.min(info.len() - 1)).cloned()
    }
}

impl Capability for InteractiveCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Interactive
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn similarity_rule(&self) -> Option<(&[String], f32)> {
        if self.config.comparison_keys.is_empty() {
            return None;
        }
        Some((&self.config.comparison_keys, self.config.comparison_threshold))
    }

    fn prerequisites_met(&self, ctx: &CapabilityContext<'_>) -> bool {
        let max = self.config.max_interaction_attempts;
        if max > 0 && self.attempts >= max {
            return false;
        }
        match ctx.interaction.kind {
            InteractionKind::Click => {
                !self.config.dialogue_options.is_empty() || !self.config.observable_info.is_empty()
            }
            InteractionKind::Drag => !self.config.givable_items.is_empty(),
            _ => true,
        }
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        let message = match ctx.interaction.kind {
            InteractionKind::Click if !self.config.dialogue_options.is_empty() => {
                let options = &self.config.dialogue_options;
                let line = options[self.dialogue_index % options.len()].clone();
                self.dialogue_index += 1;
                Some(line)
            }
            InteractionKind::Click => self.observation(ctx),
            InteractionKind::Drag if !self.config.givable_items.is_empty() => {
                let item = self.config.givable_items.remove(0);
                Some(format!("Received {}", item))
            }
            _ => None,
        };

        match message {
            Some(message) => {
                self.attempts += 1;
                CapabilityOutcome::used(vec![CapabilityEffect::Message(message)])
            }
            None => CapabilityOutcome::unused(),
        }
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert("Attempts".into(), self.attempts.to_string());
        parameters
    }
}

/// Story progression, clues and one-shot story events.
#[derive(Debug)]
pub struct NarrativeCapability {
    core: CapabilityCore,
    config: NarrativeConfig,
    story_index: Option<usize>,
    provided_clues: Vec<String>,
    triggered_events: Vec<String>,
    memories: VecDeque<String>,
}

impl NarrativeCapability {
    pub fn new(core: CapabilityCore, config: NarrativeConfig) -> Self {
        Self {
            core,
            config,
            story_index: None,
            provided_clues: Vec::new(),
            triggered_events: Vec::new(),
            memories: VecDeque::new(),
        }
    }

    pub fn current_story_step(&self) -> Option<&str> {
        self.story_index
            .and_then(|i| self.config.story_progression_path.get(i))
            .map(String::as_str)
    }

    pub fn provided_clues(&self) -> &[String] {
        &self.provided_clues
    }

    pub fn memories(&self) -> impl Iterator<Item = &String> {
        self.memories.iter()
    }

    fn remember(&mut self, entry: String) {
        self.memories.push_back(entry);
        while self.memories.len() > self.config.max_memory_count {
            self.memories.pop_front();
        }
    }

    fn advance_story(&mut self) -> Option<String> {
        let next = self.story_index.map_or(0, |i| i + 1);
        let step = self.config.story_progression_path.get(next)?.clone();
        self.story_index = Some(next);
        self.remember(step.clone());
        Some(step)
    }

    fn next_clues(&mut self) -> Vec<String> {
        let clues: Vec<String> = self
            .config
            .available_clues
            .iter()
            .filter(|c| !self.provided_clues.contains(c))
            .take(self.config.max_clues_per_interaction.max(1))
            .cloned()
            .collect();
        for clue in &clues {
            self.provided_clues.push(clue.clone());
            self.remember(clue.clone());
        }
        clues
    }
}

impl Capability for NarrativeCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Narrative
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn prerequisites_met(&self, _ctx: &CapabilityContext<'_>) -> bool {
        !self.config.story_progression_path.is_empty()
            || !self.config.triggerable_event_ids.is_empty()
            || self.config.available_clues.len() > self.provided_clues.len()
    }

    fn apply(&mut self, _ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        // Story first, then clues, then one-shot events.
        if let Some(step) = self.advance_story() {
            return CapabilityOutcome::used(vec![CapabilityEffect::TriggerEvents(vec![step])]);
        }

        let clues = self.next_clues();
        if !clues.is_empty() {
            return CapabilityOutcome::used(
                clues
                    .into_iter()
                    .map(|clue| CapabilityEffect::Message(format!("Clue: {}", clue)))
                    .collect(),
            );
        }

        let pending = self
            .config
            .triggerable_event_ids
            .iter()
            .find(|e| !self.triggered_events.contains(e))
            .cloned();
        match pending {
            Some(event_id) => {
                self.triggered_events.push(event_id.clone());
                CapabilityOutcome::used(vec![CapabilityEffect::TriggerEvents(vec![event_id])])
            }
            None => CapabilityOutcome::unused(),
        }
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert(
            "StoryStep".into(),
            self.current_story_step().unwrap_or_default().to_string(),
        );
        parameters.insert("CluesProvided".into(), self.provided_clues.len().to_string());
        parameters
    }
}

/// Rule evaluation, time scaling and relationship limits.
#[derive(Debug)]
pub struct SystemCapability {
    core: CapabilityCore,
    config: SystemConfig,
}

impl SystemCapability {
    pub fn new(core: CapabilityCore, config: SystemConfig) -> Self {
        Self { core, config }
    }

    /// True when every condition rule holds. An empty rule set never holds.
    pub fn conditions_met(&self, ctx: &CapabilityContext<'_>) -> bool {
        !self.config.condition_rules.is_empty()
            && self
                .config
                .condition_rules
                .iter()
                .all(|(node, required)| ctx.graph.node_state(node) == Some(*required))
    }
}

impl Capability for SystemCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::System
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        if self.conditions_met(ctx) && !self.config.events_on_satisfied.is_empty() {
            return CapabilityOutcome::used(vec![CapabilityEffect::TriggerEvents(
                self.config.events_on_satisfied.clone(),
            )]);
        }
        CapabilityOutcome::used(Vec::new())
    }

    fn time_scale(&self) -> Option<f32> {
        Some(self.config.time_scale.max(0.0))
    }

    fn relationship_limit(&self) -> Option<usize> {
        Some(self.config.max_relationships)
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert("TimeScale".into(), format!("{:.2}", self.config.time_scale));
        parameters.insert(
            "MaxRelationships".into(),
            self.config.max_relationships.to_string(),
        );
        parameters
    }
}

/// Player health, mental state and named resource pools.
#[derive(Debug)]
pub struct NumericalCapability {
    core: CapabilityCore,
    config: NumericalConfig,
    health: f32,
    mental_state: f32,
    pools: IndexMap<String, f32>,
}

impl NumericalCapability {
    pub fn new(core: CapabilityCore, config: NumericalConfig) -> Self {
        Self {
            core,
            health: config.player_max_health,
            mental_state: config.max_mental_state,
            pools: config.resource_pools.clone(),
            config,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn mental_state(&self) -> f32 {
        self.mental_state
    }

    pub fn resource(&self, name: &str) -> Option<f32> {
        self.pools.get(name).copied()
    }

    pub fn modify_health(&mut self, delta: f32) -> f32 {
        self.health = (self.health + delta).clamp(0.0, self.config.player_max_health);
        self.health
    }

    pub fn modify_mental_state(&mut self, delta: f32) -> f32 {
        self.mental_state = (self.mental_state + delta).clamp(0.0, self.config.max_mental_state);
        self.mental_state
    }

    /// Pools never drop below zero.
    pub fn modify_resource(&mut self, name: &str, delta: f32) -> f32 {
        let value = self.pools.entry(name.to_string()).or_insert(0.0);
        *value = (*value + delta).max(0.0);
        *value
    }
}

impl Capability for NumericalCapability {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Numerical
    }

    fn core(&self) -> &CapabilityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CapabilityCore {
        &mut self.core
    }

    fn apply(&mut self, ctx: &CapabilityContext<'_>) -> CapabilityOutcome {
        let interaction = ctx.interaction;
        let amount = interaction
            .context_value("Amount")
            .and_then(|a| a.parse::<f32>().ok());

        let message = if let (Some(name), Some(amount)) = (interaction.context_value("Resource"), amount) {
            let value = self.modify_resource(name, amount);
            format!("{}: {:.0}", name, value)
        } else if self.health < self.config.player_max_health {
            let health = self.modify_health(self.config.health_restore);
            format!("Health restored to {:.0}", health)
        } else if self.mental_state < self.config.max_mental_state {
            let mental = self.modify_mental_state(self.config.mental_restore);
            format!("Mental state restored to {:.0}", mental)
        } else {
            return CapabilityOutcome::used(Vec::new());
        };

        CapabilityOutcome::used(vec![CapabilityEffect::Message(message)])
    }

    fn parameters(&self) -> IndexMap<String, String> {
        let mut parameters = IndexMap::new();
        parameters.insert("Health".into(), format!("{:.0}", self.health));
        parameters.insert("MentalState".into(), format!("{:.0}", self.mental_state));
        for (name, value) in &self.pools {
            parameters.insert(format!("Pool.{}", name), format!("{:.0}", value));
        }
        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::GraphView;
    use node_rules::{CapabilityConfig, CapabilitySpec, InteractionData, Vec3};
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubGraph {
        states: HashMap<String, NodeState>,
        nearby: Vec<NodeId>,
        dependents: Vec<NodeId>,
    }

    impl GraphView for StubGraph {
        fn node_state(&self, id: &str) -> Option<NodeState> {
            self.states.get(id).copied()
        }

        fn node_ids_in_radius(&self, _center: Vec3, _radius: f32) -> Vec<NodeId> {
            self.nearby.clone()
        }

        fn outgoing_targets(&self, _id: &str, _relation: RelationType) -> Vec<NodeId> {
            self.dependents.clone()
        }
    }

    fn core(config: &CapabilityConfig) -> CapabilityCore {
        let mut core = CapabilityCore::new(&CapabilitySpec::new(config.clone()));
        core.activate();
        core
    }

    fn context<'a>(
        owner: &'a NodeId,
        interaction: &'a InteractionData,
        graph: &'a StubGraph,
    ) -> CapabilityContext<'a> {
        CapabilityContext {
            owner,
            owner_state: NodeState::Active,
            owner_position: Vec3::ZERO,
            interaction,
            graph,
        }
    }

    #[test]
    fn test_spatial_teleport() {
        let config = SpatialConfig {
            teleport_destination: Some(Vec3::new(5.0, 5.0, 0.0)),
            ..Default::default()
        };
        let mut capability =
            SpatialCapability::new(core(&CapabilityConfig::Spatial(config.clone())), config);
        let owner = NodeId::from("portal");
        let graph = StubGraph::default();

        let click = InteractionData::new(InteractionKind::Click).with_instigator("player", Vec3::ZERO);
        let outcome = capability.use_capability(&context(&owner, &click, &graph));
        assert!(outcome.used);
        assert_eq!(
            outcome.effects,
            vec![CapabilityEffect::Teleport {
                instigator: "player".into(),
                destination: Vec3::new(5.0, 5.0, 0.0)
            }]
        );

        let anonymous = InteractionData::new(InteractionKind::Click);
        assert!(!capability.use_capability(&context(&owner, &anonymous, &graph)).used);
    }

    #[test]
    fn test_spatial_containment_limit() {
        let config = SpatialConfig {
            max_contained_nodes: 1,
            ..Default::default()
        };
        let mut capability =
            SpatialCapability::new(core(&CapabilityConfig::Spatial(config.clone())), config);
        let owner = NodeId::from("chest");
        let mut graph = StubGraph::default();
        graph.states.insert("coin".into(), NodeState::Active);
        graph.states.insert("gem".into(), NodeState::Active);

        let drag = InteractionData::new(InteractionKind::Drag).with_context("ContainedNode", "coin");
        let outcome = capability.use_capability(&context(&owner, &drag, &graph));
        assert!(outcome.used);
        assert_eq!(
            outcome.effects[0],
            CapabilityEffect::SetNodeState {
                node: "coin".into(),
                state: NodeState::Hidden
            }
        );

        let drag = InteractionData::new(InteractionKind::Drag).with_context("ContainedNode", "gem");
        assert!(!capability.can_use(&context(&owner, &drag, &graph)));
        assert_eq!(capability.contained_nodes().len(), 1);
    }

    #[test]
    fn test_state_cycles_and_broadcasts() {
        let config = StateConfig {
            affected_state: Some(NodeState::Completed),
            target_node_ids: vec!["explicit".into()],
            ..Default::default()
        };
        let mut capability =
            StateCapability::new(core(&CapabilityConfig::State(config.clone())), config);
        capability.on_owner_state_changed(NodeState::Active);

        let owner = NodeId::from("lever");
        let graph = StubGraph {
            nearby: vec!["lever".into(), "lamp".into(), "explicit".into()],
            dependents: vec!["gate".into()],
            ..Default::default()
        };
        let click = InteractionData::new(InteractionKind::Click);
        let outcome = capability.use_capability(&context(&owner, &click, &graph));

        assert_eq!(
            outcome.effects,
            vec![
                CapabilityEffect::SetNodeState { node: "lever".into(), state: NodeState::Inactive },
                CapabilityEffect::SetNodeState { node: "explicit".into(), state: NodeState::Completed },
                CapabilityEffect::SetNodeState { node: "lamp".into(), state: NodeState::Completed },
                CapabilityEffect::SetNodeState { node: "gate".into(), state: NodeState::Completed },
            ]
        );
    }

    #[test]
    fn test_interactive_dialogue_and_attempt_limit() {
        let config = InteractiveConfig {
            dialogue_options: vec!["Hello".into(), "Again?".into()],
            max_interaction_attempts: 2,
            ..Default::default()
        };
        let mut capability =
            InteractiveCapability::new(core(&CapabilityConfig::Interactive(config.clone())), config);
        let owner = NodeId::from("npc");
        let graph = StubGraph::default();
        let click = InteractionData::new(InteractionKind::Click);

        let first = capability.use_capability(&context(&owner, &click, &graph));
        assert_eq!(first.effects, vec![CapabilityEffect::Message("Hello".into())]);
        let second = capability.use_capability(&context(&owner, &click, &graph));
        assert_eq!(second.effects, vec![CapabilityEffect::Message("Again?".into())]);

        assert!(!capability.use_capability(&context(&owner, &click, &graph)).used);
        assert_eq!(capability.attempts(), 2);
    }

    #[test]
    fn test_interactive_observation_by_distance() {
        let config = InteractiveConfig {
            observable_info: vec!["Scratches on the lock".into(), "A small box".into()],
            ..Default::default()
        };
        let mut capability =
            InteractiveCapability::new(core(&CapabilityConfig::Interactive(config.clone())), config);
        let owner = NodeId::from("box");
        let graph = StubGraph::default();

        let far = InteractionData::new(InteractionKind::Click)
            .with_instigator("player", Vec3::new(900.0, 0.0, 0.0));
        let outcome = capability.use_capability(&context(&owner, &far, &graph));
        assert_eq!(outcome.effects, vec![CapabilityEffect::Message("A small box".into())]);

        let near = InteractionData::new(InteractionKind::Click)
            .with_instigator("player", Vec3::new(10.0, 0.0, 0.0));
        let outcome = capability.use_capability(&context(&owner, &near, &graph));
        assert_eq!(
            outcome.effects,
            vec![CapabilityEffect::Message("Scratches on the lock".into())]
        );
    }

    #[test]
    fn test_narrative_order() {
        let config = NarrativeConfig {
            story_progression_path: vec!["arrival".into()],
            available_clues: vec!["ash".into(), "rope".into()],
            triggerable_event_ids: vec!["storm".into()],
            max_memory_count: 2,
            ..Default::default()
        };
        let mut capability =
            NarrativeCapability::new(core(&CapabilityConfig::Narrative(config.clone())), config);
        let owner = NodeId::from("journal");
        let graph = StubGraph::default();
        let click = InteractionData::new(InteractionKind::Click);
        let use_once = |capability: &mut NarrativeCapability| {
            capability.use_capability(&context(&owner, &click, &graph)).effects
        };

        assert_eq!(
            use_once(&mut capability),
            vec![CapabilityEffect::TriggerEvents(vec!["arrival".into()])]
        );
        assert_eq!(capability.current_story_step(), Some("arrival"));
        assert_eq!(use_once(&mut capability), vec![CapabilityEffect::Message("Clue: ash".into())]);
        assert_eq!(use_once(&mut capability), vec![CapabilityEffect::Message("Clue: rope".into())]);
        assert_eq!(
            use_once(&mut capability),
            vec![CapabilityEffect::TriggerEvents(vec!["storm".into()])]
        );
        assert!(use_once(&mut capability).is_empty());

        let memories: Vec<_> = capability.memories().cloned().collect();
        assert_eq!(memories, vec!["ash".to_string(), "rope".to_string()]);
    }

    #[test]
    fn test_system_conditions() {
        let mut config = SystemConfig {
            events_on_satisfied: vec!["vault_open".into()],
            time_scale: 2.0,
            ..Default::default()
        };
        config.condition_rules.insert("lever_a".into(), NodeState::Completed);
        config.condition_rules.insert("lever_b".into(), NodeState::Completed);
        let mut capability =
            SystemCapability::new(core(&CapabilityConfig::System(config.clone())), config);
        let owner = NodeId::from("vault");
        let click = InteractionData::new(InteractionKind::Click);

        let mut graph = StubGraph::default();
        graph.states.insert("lever_a".into(), NodeState::Completed);
        graph.states.insert("lever_b".into(), NodeState::Active);
        let outcome = capability.use_capability(&context(&owner, &click, &graph));
        assert!(outcome.used);
        assert!(outcome.effects.is_empty());

        graph.states.insert("lever_b".into(), NodeState::Completed);
        let outcome = capability.use_capability(&context(&owner, &click, &graph));
        assert_eq!(
            outcome.effects,
            vec![CapabilityEffect::TriggerEvents(vec!["vault_open".into()])]
        );
        assert_eq!(capability.time_scale(), Some(2.0));
        assert_eq!(capability.relationship_limit(), Some(10));
    }

    #[test]
    fn test_numerical_resources() {
        let config = NumericalConfig::default();
        let mut capability =
            NumericalCapability::new(core(&CapabilityConfig::Numerical(config.clone())), config);
        let owner = NodeId::from("potion");
        let graph = StubGraph::default();

        capability.modify_health(-50.0);
        let click = InteractionData::new(InteractionKind::Click);
        let outcome = capability.use_capability(&context(&owner, &click, &graph));
        assert_eq!(
            outcome.effects,
            vec![CapabilityEffect::Message("Health restored to 70".into())]
        );

        let refill = InteractionData::new(InteractionKind::Click)
            .with_context("Resource", "oil")
            .with_context("Amount", "-5");
        capability.use_capability(&context(&owner, &refill, &graph));
        assert_eq!(capability.resource("oil"), Some(0.0));
        assert!((capability.modify_health(500.0) - 100.0).abs() < 0.01);
    }
}
