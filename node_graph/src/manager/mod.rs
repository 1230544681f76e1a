//! Graph Manager - the single owner of every node and connection.
//!
//! The manager keeps the primary registries and all derived indices, applies
//! state changes and their propagation, runs the timer queue, and drives the
//! generation pipeline:
//! 1. **Register**: Nodes enter the registry and the type/tag/active indices
//! 2. **Connect**: Connections are indexed under both endpoints
//! 3. **Propagate**: State changes cascade along connections per relation type
//! 4. **Generate**: Queued specs are turned into nodes and connections on a fixed interval

mod connections;
mod generation;
mod maintenance;
mod propagation;
mod query;
mod scene;
mod scheduler;

pub use generation::*;
pub use maintenance::*;
pub use query::*;
pub use scheduler::*;

use indexmap::{IndexMap, IndexSet};
use node_rules::{
    ConnectionId, GraphConfig, NodeClass, NodeId, NodeSpec, NodeState, NodeType, RelationSpec,
    Tag, Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::capability::{self, Capability};
use crate::error::{GraphError, GraphResult};
use crate::events::{EventBus, GraphEvent, ObserverId};
use crate::graph::{Connection, Node};

/// Outcome of [`GraphManager::create_node`].
#[derive(Debug)]
pub enum CreatedNode {
    /// The node was auto-registered and lives in the manager.
    Registered(NodeId),
    /// Auto-registration is off; the caller owns the node.
    Unregistered(Node),
}

impl CreatedNode {
    pub fn id(&self) -> &NodeId {
        match self {
            CreatedNode::Registered(id) => id,
            CreatedNode::Unregistered(node) => node.id(),
        }
    }
}

/// Owns the node graph.
pub struct GraphManager {
    config: GraphConfig,

    /// All nodes by ID, in registration order.
    nodes: IndexMap<NodeId, Node>,

    /// All connections by ID, in creation order.
    connections: IndexMap<ConnectionId, Connection>,

    /// Index: Node -> connections touching it (either endpoint).
    connections_by_node: HashMap<NodeId, Vec<ConnectionId>>,

    /// Index: Type -> nodes of that type.
    type_index: HashMap<NodeType, IndexSet<NodeId>>,

    /// Index: Tag -> nodes carrying it.
    tag_index: HashMap<Tag, IndexSet<NodeId>>,

    /// Nodes currently in the `Active` state.
    active_nodes: IndexSet<NodeId>,

    active_scene: Option<NodeId>,

    node_queue: VecDeque<NodeSpec>,
    relation_queue: VecDeque<RelationSpec>,

    scheduler: Scheduler,
    events: EventBus,
    rng: StdRng,
}

impl GraphManager {
    /// Create a manager with the given configuration.
    pub fn new(config: GraphConfig) -> Self {
        let rng = match config.spawn_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut manager = Self {
            config,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            connections_by_node: HashMap::new(),
            type_index: HashMap::new(),
            tag_index: HashMap::new(),
            active_nodes: IndexSet::new(),
            active_scene: None,
            node_queue: VecDeque::new(),
            relation_queue: VecDeque::new(),
            scheduler: Scheduler::new(),
            events: EventBus::new(),
            rng,
        };
        manager.arm_generation_tick();
        manager
    }

    /// Create a manager with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(GraphConfig::default())
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Subscribe to every event the manager emits.
    pub fn subscribe(&mut self, observer: impl FnMut(&GraphEvent) + 'static) -> ObserverId {
        self.events.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.emit(event);
    }

    /// Instantiate a node from a spec without registering it.
    ///
    /// The node is placed at the spec's position, or at a random point around
    /// the manager's origin. Item nodes get the spec's capabilities attached.
    pub fn spawn_node(&mut self, class: Option<NodeClass>, spec: &NodeSpec) -> GraphResult<Node> {
        let Some(class) = class else {
            warn!(node = %spec.id, "cannot spawn node without a node class");
            return Err(GraphError::MissingClass(spec.id.clone()));
        };

        let position = spec
            .position
            .unwrap_or_else(|| self.random_spawn_location());
        let mut node = Node::from_spec(spec, class, position);

        if class == NodeClass::Item {
            for capability_spec in &spec.capabilities {
                let mut capability = capability::build(capability_spec);
                capability.initialize(&node);
                node.attach_capability(capability);
            }
        } else if !spec.capabilities.is_empty() {
            debug!(node = %spec.id, ?class, "capabilities ignored on non-item node");
        }

        Ok(node)
    }

    /// Spawn a node and, if configured, register it.
    pub fn create_node(
        &mut self,
        class: Option<NodeClass>,
        spec: &NodeSpec,
    ) -> GraphResult<CreatedNode> {
        let node = self.spawn_node(class, spec)?;
        if self.config.auto_register_spawned_nodes {
            self.register_node(node).map(CreatedNode::Registered)
        } else {
            Ok(CreatedNode::Unregistered(node))
        }
    }

    fn random_spawn_location(&mut self) -> Vec3 {
        let radius = self.config.node_spawn_radius;
        let min = self.config.min_spawn_distance.min(radius);

        let angle = self.rng.gen_range(0.0f32..360.0).to_radians();
        let distance = if min < radius {
            self.rng.gen_range(min..=radius)
        } else {
            radius
        };

        let origin = self.config.origin;
        Vec3::new(
            origin.x + angle.cos() * distance,
            origin.y + angle.sin() * distance,
            origin.z,
        )
    }

    /// Add a node to the registry and every index.
    pub fn register_node(&mut self, node: Node) -> GraphResult<NodeId> {
        if node.id().is_empty() {
            warn!(name = node.name(), "cannot register node with empty id");
            return Err(GraphError::EmptyNodeId);
        }
        if self.nodes.contains_key(node.id().as_str()) {
            warn!(node = %node.id(), "node already registered");
            return Err(GraphError::DuplicateNode(node.id().clone()));
        }

        let id = node.id().clone();

        // Index by type
        self.type_index
            .entry(node.node_type())
            .or_default()
            .insert(id.clone());

        // Index by tags
        for tag in node.tags() {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(id.clone());
        }

        if node.state() == NodeState::Active {
            self.active_nodes.insert(id.clone());
        }

        self.nodes.insert(id.clone(), node);
        info!(node = %id, "node registered");
        self.emit(GraphEvent::NodeRegistered { node: id.clone() });
        Ok(id)
    }

    /// Remove a node and every connection touching it.
    pub fn unregister_node(&mut self, id: &str) -> Option<Node> {
        if !self.nodes.contains_key(id) {
            debug!(node = id, "unregister of unknown node ignored");
            return None;
        }

        self.remove_all_connections_for_node(id);
        let node = self.nodes.shift_remove(id)?;
        let node_id = node.id().clone();

        // Remove from indices
        if let Some(ids) = self.type_index.get_mut(&node.node_type()) {
            ids.shift_remove(id);
        }
        for tag in node.tags() {
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.shift_remove(id);
            }
        }
        self.active_nodes.shift_remove(id);
        self.connections_by_node.remove(id);

        for other in self.nodes.values_mut() {
            if let Some(scene) = other.scene_mut() {
                scene.remove_child(id);
            }
        }
        self.scheduler.cancel_where(|task| task.targets_node(id));

        if self.active_scene.as_deref() == Some(id) {
            self.active_scene = None;
            self.emit(GraphEvent::SceneChanged {
                previous: Some(node_id.clone()),
                current: None,
            });
        }

        info!(node = %node_id, "node unregistered");
        self.emit(GraphEvent::NodeUnregistered { node: node_id });
        Some(node)
    }

    /// Mutable access for properties, position and other non-indexed fields.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Add a tag to a registered node, keeping the tag index in sync.
    pub fn add_node_tag(&mut self, id: &str, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !node.add_tag(tag.clone()) {
            return false;
        }
        let node_id = node.id().clone();
        self.tag_index.entry(tag).or_default().insert(node_id);
        true
    }

    pub fn remove_node_tag(&mut self, id: &str, tag: &Tag) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !node.remove_tag(tag) {
            return false;
        }
        if let Some(ids) = self.tag_index.get_mut(tag) {
            ids.shift_remove(id);
        }
        true
    }

    /// Advance the clock, ticking cooldowns and firing every timer that falls due.
    pub fn advance(&mut self, dt: Duration) {
        let Some(target) = self.scheduler.now().checked_add(dt) else {
            warn!(?dt, "clock advance overflows, ignoring");
            return;
        };

        let seconds = dt.as_secs_f32();
        for node in self.nodes.values_mut() {
            node.tick_capabilities(seconds);
        }

        while let Some(task) = self.scheduler.pop_due(target) {
            self.run_task(task);
        }
        self.scheduler.advance_to(target);
    }

    /// Time elapsed on the manager's clock.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Pending delayed callbacks, not counting the recurring generation tick.
    pub fn pending_timers(&self) -> usize {
        self.scheduler
            .pending()
            .filter(|task| !matches!(task, ScheduledTask::GenerationTick))
            .count()
    }

    /// Cancel a pending timer.
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.scheduler.cancel(id)
    }

    fn run_task(&mut self, task: ScheduledTask) {
        match task {
            ScheduledTask::PropagateState {
                connection,
                from,
                state,
            } => self.run_delayed_propagation(&connection, &from, state),
            ScheduledTask::SceneTransition { scene } => {
                if let Err(err) = self.set_active_scene(Some(&scene)) {
                    warn!(scene = %scene, error = %err, "scheduled scene transition failed");
                }
            }
            ScheduledTask::GenerationTick => {
                self.process_generation_queue();
                self.arm_generation_tick();
            }
        }
    }

    fn arm_generation_tick(&mut self) {
        let interval = self.config.generation_interval();
        if interval.is_zero() {
            warn!("generation interval is zero, queue only drains manually");
            return;
        }
        self.scheduler
            .schedule(interval, ScheduledTask::GenerationTick);
    }
}

impl std::fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphManager")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("active_scene", &self.active_scene)
            .field("queued_nodes", &self.node_queue.len())
            .field("queued_relations", &self.relation_queue.len())
            .field("now", &self.scheduler.now())
            .finish()
    }
}
