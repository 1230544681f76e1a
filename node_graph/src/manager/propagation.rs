//! State changes, interactions and their cascades through the graph.
//!
//! A cascade is drained from a FIFO worklist. Every hop is keyed by its
//! `(connection, source node, state)` triple and followed at most once per
//! cascade, so cyclic graphs settle while acyclic chains of any length run to
//! the end.

use node_rules::{ConnectionId, InteractionData, NodeClass, NodeId, NodeState, RelationType, Vec3};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::GraphManager;
use crate::capability::{Capability, CapabilityContext, CapabilityEffect, GraphView};
use crate::events::GraphEvent;
use crate::graph::StateEffect;

/// One pending unit of work in a state cascade.
#[derive(Debug)]
enum Step {
    /// Move a node into a state, if its precondition still holds.
    Apply(StateEffect),
    /// Push a node's new state across its connections, unless it moved on since.
    Spread(NodeId, NodeState),
}

/// Bookkeeping for one state cascade.
struct Cascade {
    pending: VecDeque<Step>,
    visited: HashSet<(ConnectionId, NodeId, NodeState)>,
    max_steps: usize,
}

impl Cascade {
    fn new(max_steps: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            visited: HashSet::new(),
            max_steps,
        }
    }

    /// Returns false if this hop was already taken in the cascade.
    fn visit(&mut self, connection: &ConnectionId, from: &NodeId, state: NodeState) -> bool {
        self.visited
            .insert((connection.clone(), from.clone(), state))
    }

    fn push(&mut self, step: Step) {
        self.pending.push_back(step);
    }
}

impl GraphManager {
    /// Change a node's state and propagate the change.
    ///
    /// Returns false if the node is unknown or already in `state`; in that
    /// case nothing is notified or propagated.
    pub fn set_node_state(&mut self, id: &str, state: NodeState) -> bool {
        let mut cascade = Cascade::new(self.config.max_cascade_steps);
        let changed = self.apply_state(id, state, &mut cascade);
        self.drain(&mut cascade);
        changed
    }

    /// Push `from` entering `state` across a single connection, immediately.
    pub fn propagate_state(&mut self, connection: &str, from: &str, state: NodeState) -> bool {
        let Some(effect) = self
            .connections
            .get(connection)
            .and_then(|c| c.state_effect(from, state))
        else {
            return false;
        };
        let mut cascade = Cascade::new(self.config.max_cascade_steps);
        let changed = self.apply_effect(effect, &mut cascade);
        self.drain(&mut cascade);
        changed
    }

    /// Whether every prerequisite source pointing at `id` is completed.
    pub fn check_prerequisites(&self, id: &str) -> bool {
        self.incoming_connections(id)
            .into_iter()
            .filter(|c| c.relation() == RelationType::Prerequisite)
            .all(|c| self.node_state(c.source()) == Some(NodeState::Completed))
    }

    fn drain(&mut self, cascade: &mut Cascade) {
        let mut steps = 0;
        while let Some(step) = cascade.pending.pop_front() {
            steps += 1;
            if steps > cascade.max_steps {
                warn!(
                    dropped = cascade.pending.len() + 1,
                    "cascade step budget exhausted"
                );
                cascade.pending.clear();
                return;
            }
            match step {
                Step::Apply(effect) => {
                    self.apply_effect(effect, cascade);
                }
                Step::Spread(node, state) => {
                    // A later change already moved the node on and spreads that instead.
                    if self.node_state(&node) == Some(state) {
                        self.propagate_from(&node, state, cascade);
                    }
                }
            }
        }
    }

    /// Change one node's state and queue everything that follows from it.
    fn apply_state(&mut self, id: &str, state: NodeState, cascade: &mut Cascade) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            debug!(node = id, "state change for unknown node ignored");
            return false;
        };
        let Some(transition) = node.set_state(state) else {
            return false;
        };
        node.notify_capabilities(state);
        let node_id = node.id().clone();

        if state == NodeState::Active {
            self.active_nodes.insert(node_id.clone());
        } else {
            self.active_nodes.shift_remove(&node_id);
        }

        debug!(node = %node_id, old = %transition.old, new = %transition.new, "node state changed");
        self.emit(GraphEvent::NodeStateChanged {
            node: node_id.clone(),
            old: transition.old,
            new: transition.new,
        });

        if state == NodeState::Completed {
            self.complete_finished_scenes(&node_id, cascade);
            self.activate_dependents(&node_id, cascade);
        }
        cascade.push(Step::Spread(node_id, state));
        true
    }

    fn propagate_from(&mut self, node: &NodeId, state: NodeState, cascade: &mut Cascade) {
        let ids = self
            .connections_by_node
            .get(node.as_str())
            .cloned()
            .unwrap_or_default();

        for id in ids {
            let Some(connection) = self.connections.get(&id) else {
                continue;
            };
            if !connection.can_propagate_state(state) || connection.opposite(node).is_none() {
                continue;
            }

            let delay = connection.activation_delay();
            if delay > 0.0 {
                self.schedule_propagation(&id, node, state, delay);
                continue;
            }

            let effect = connection.state_effect(node, state);
            if !cascade.visit(&id, node, state) {
                debug!(connection = %id, node = %node, "cycle detected, skipping hop");
                continue;
            }
            if let Some(effect) = effect {
                cascade.push(Step::Apply(effect));
            }
        }
    }

    fn apply_effect(&mut self, effect: StateEffect, cascade: &mut Cascade) -> bool {
        if let Some(required) = effect.requires {
            if self.node_state(&effect.target) != Some(required) {
                return false;
            }
        }
        self.apply_state(&effect.target, effect.state, cascade)
    }

    /// Unlock gated nodes once all of their prerequisites are complete.
    fn activate_dependents(&mut self, completed: &NodeId, cascade: &mut Cascade) {
        let dependents: Vec<NodeId> = self
            .outgoing_connections(completed)
            .into_iter()
            .filter(|c| c.relation().is_gating())
            .map(|c| c.target().clone())
            .collect();

        for dependent in dependents {
            if self.node_state(&dependent) == Some(NodeState::Locked)
                && self.check_prerequisites(&dependent)
            {
                info!(node = %dependent, unlocked_by = %completed, "prerequisites satisfied");
                cascade.push(Step::Apply(StateEffect {
                    target: dependent,
                    state: NodeState::Active,
                    requires: Some(NodeState::Locked),
                }));
            }
        }
    }

    /// Complete every scene whose children are now all completed.
    fn complete_finished_scenes(&mut self, child: &NodeId, cascade: &mut Cascade) {
        let finished: Vec<NodeId> = self
            .scenes_containing(child)
            .into_iter()
            .filter(|scene| {
                self.node_state(scene) != Some(NodeState::Completed)
                    && self.scene_children(scene).iter().all(|c| {
                        self.node_state(c) == Some(NodeState::Completed)
                    })
            })
            .collect();

        for scene in finished {
            info!(scene = %scene, "all scene children completed");
            cascade.push(Step::Apply(StateEffect {
                target: scene,
                state: NodeState::Completed,
                requires: None,
            }));
        }
    }

    pub(super) fn run_delayed_propagation(&mut self, connection: &ConnectionId, from: &NodeId, state: NodeState) {
        let Some(effect) = self
            .connections
            .get(connection)
            .and_then(|c| c.state_effect(from, state))
        else {
            debug!(connection = %connection, "delayed propagation no longer applies");
            return;
        };
        let mut cascade = Cascade::new(self.config.max_cascade_steps);
        cascade.visit(connection, from, state);
        self.apply_effect(effect, &mut cascade);
        self.drain(&mut cascade);
    }

    /// Interact with a node, running its capabilities and forwarding the
    /// interaction along parent and mutual connections.
    ///
    /// Every node is visited at most once per interaction.
    pub fn interact(&mut self, id: &str, interaction: InteractionData) -> bool {
        let mut visited = HashSet::new();
        self.interact_inner(id, interaction, &mut visited)
    }

    /// Forward an interaction from `from` across one connection.
    pub fn propagate_interaction(
        &mut self,
        connection: &str,
        from: &str,
        interaction: &InteractionData,
    ) -> bool {
        let Some(connection) = self
            .connections
            .get(connection)
            .filter(|c| c.can_propagate_interaction())
        else {
            return false;
        };
        let Some(to) = connection.opposite(from).cloned() else {
            return false;
        };

        let forwarded = interaction
            .clone()
            .with_context("PropagatedFrom", from)
            .with_context("ConnectionType", connection.relation().name());
        let mut visited = HashSet::from([NodeId::from(from)]);
        self.interact_inner(&to, forwarded, &mut visited)
    }

    fn interact_inner(
        &mut self,
        id: &str,
        interaction: InteractionData,
        visited: &mut HashSet<NodeId>,
    ) -> bool {
        if visited.contains(id) {
            return false;
        }
        let Some(node) = self.nodes.get(id) else {
            debug!(node = id, "interaction with unknown node ignored");
            return false;
        };
        if !node.can_interact(&interaction) {
            debug!(node = id, kind = ?interaction.kind, "interaction rejected");
            return false;
        }

        let node_id = node.id().clone();
        let is_item = node.class() == NodeClass::Item;
        let story = node
            .should_trigger_story()
            .then(|| (node.story_fragment().to_string(), node.trigger_event_ids().to_vec()));
        visited.insert(node_id.clone());

        debug!(node = %node_id, kind = ?interaction.kind, "node interacted");
        self.emit(GraphEvent::NodeInteracted {
            node: node_id.clone(),
            interaction: interaction.clone(),
        });

        if let Some((fragment, event_ids)) = story {
            self.raise_story(&node_id, fragment, event_ids);
        }
        if is_item {
            self.use_item(&node_id, &interaction);
        }

        let forward: Vec<(NodeId, RelationType)> = self
            .connections_for_node(&node_id)
            .into_iter()
            .filter(|c| c.can_propagate_interaction())
            .filter_map(|c| c.opposite(&node_id).map(|to| (to.clone(), c.relation())))
            .collect();

        for (to, relation) in forward {
            let forwarded = interaction
                .clone()
                .with_context("PropagatedFrom", node_id.as_str())
                .with_context("ConnectionType", relation.name());
            self.interact_inner(&to, forwarded, visited);
        }
        true
    }

    /// Run an item's capabilities, then apply what they asked for.
    fn use_item(&mut self, id: &NodeId, interaction: &InteractionData) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let mut capabilities = node.take_capabilities();
        let owner_state = node.state();
        let owner_position = node.position();

        let mut used_any = false;
        let mut requested = Vec::new();
        {
            let ctx = CapabilityContext {
                owner: id,
                owner_state,
                owner_position,
                interaction,
                graph: &*self,
            };
            for capability in capabilities.iter_mut() {
                if !capability.can_use(&ctx) {
                    continue;
                }
                let outcome = capability.use_capability(&ctx);
                if outcome.used {
                    used_any = true;
                    debug!(node = %id, capability = capability.id(), "capability used");
                }
                requested.push((capability.id().to_string(), outcome.effects));
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.restore_capabilities(capabilities);
        }
        for (capability, effects) in requested {
            self.apply_capability_effects(id, &capability, effects);
        }

        // Plain items complete on their first use.
        if !used_any && self.node_state(id) == Some(NodeState::Active) {
            self.set_node_state(id, NodeState::Completed);
        }
    }

    fn apply_capability_effects(&mut self, owner: &NodeId, capability: &str, effects: Vec<CapabilityEffect>) {
        for effect in effects {
            match effect {
                CapabilityEffect::SetNodeState { node, state } => {
                    self.set_node_state(&node, state);
                }
                CapabilityEffect::TriggerEvents(event_ids) => {
                    let Some(node) = self.nodes.get_mut(owner) else {
                        continue;
                    };
                    for event_id in &event_ids {
                        node.add_trigger_event(event_id.clone());
                    }
                    let fragment = node.story_fragment().to_string();
                    self.raise_story(owner, fragment, event_ids);
                }
                CapabilityEffect::Teleport {
                    instigator,
                    destination,
                } => {
                    info!(node = %owner, instigator = %instigator, ?destination, "instigator teleported");
                    self.emit(GraphEvent::InstigatorTeleported {
                        node: owner.clone(),
                        instigator,
                        destination,
                    });
                }
                CapabilityEffect::Message(message) => {
                    self.emit(GraphEvent::CapabilityMessage {
                        node: owner.clone(),
                        capability: capability.to_string(),
                        message,
                    });
                }
            }
        }
    }

    /// Announce a story beat and record its events on the containing scenes.
    fn raise_story(&mut self, node: &NodeId, fragment: String, event_ids: Vec<String>) {
        for scene in self.scenes_containing(node) {
            if let Some(scene) = self.nodes.get_mut(&scene).and_then(|n| n.scene_mut()) {
                scene.record_events(&event_ids);
            }
        }
        info!(node = %node, events = event_ids.len(), "story triggered");
        self.emit(GraphEvent::StoryTriggered {
            node: node.clone(),
            fragment,
            event_ids,
        });
    }
}

impl GraphView for GraphManager {
    fn node_state(&self, id: &str) -> Option<NodeState> {
        self.nodes.get(id).map(|n| n.state())
    }

    fn node_ids_in_radius(&self, center: Vec3, radius: f32) -> Vec<NodeId> {
        self.nodes_in_radius(center, radius)
            .into_iter()
            .map(|n| n.id().clone())
            .collect()
    }

    fn outgoing_targets(&self, id: &str, relation: RelationType) -> Vec<NodeId> {
        self.outgoing_connections(id)
            .into_iter()
            .filter(|c| c.relation() == relation)
            .map(|c| c.target().clone())
            .collect()
    }
}
