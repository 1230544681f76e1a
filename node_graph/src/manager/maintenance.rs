//! Consistency checks, reset and state snapshots.

use indexmap::IndexMap;
use node_rules::{NodeClass, NodeId, NodeState, NodeType, RelationSpec, Tag, Vec3};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{GraphManager, ScheduledTask};
use crate::capability::Capability;
use crate::events::GraphEvent;
use crate::graph::{Connection, Node};

/// What [`GraphManager::validate_system`] found and purged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Connections whose source or target no longer exists.
    pub dangling_connections: usize,
    /// Index entries (by node, type, tag, active list) naming missing nodes or connections.
    pub dangling_index_entries: usize,
    /// Scene child entries naming missing nodes.
    pub dangling_scene_children: usize,
    /// The active scene pointed at a missing node.
    pub cleared_active_scene: bool,
    /// Timers targeting missing nodes or connections.
    pub cancelled_timers: usize,
}

impl ValidationReport {
    pub fn found_dangling(&self) -> bool {
        *self != Self::default()
    }

    pub fn purged(&self) -> usize {
        self.dangling_connections
            + self.dangling_index_entries
            + self.dangling_scene_children
            + self.cancelled_timers
            + usize::from(self.cleared_active_scene)
    }
}

/// Serializable view of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub class: NodeClass,
    pub state: NodeState,
    pub position: Vec3,
    pub tags: Vec<Tag>,
    pub properties: IndexMap<String, String>,
    pub story_fragment: String,
    pub trigger_event_ids: Vec<String>,
    pub capabilities: Vec<String>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id().clone(),
            name: node.name().to_string(),
            node_type: node.node_type(),
            class: node.class(),
            state: node.state(),
            position: node.position(),
            tags: node.tags().to_vec(),
            properties: node.properties().clone(),
            story_fragment: node.story_fragment().to_string(),
            trigger_event_ids: node.trigger_event_ids().to_vec(),
            capabilities: node.capabilities().map(|c| c.id().to_string()).collect(),
        }
    }
}

/// Serializable view of one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRecord {
    #[serde(flatten)]
    pub relation: RelationSpec,
    pub active: bool,
}

impl From<&Connection> for ConnectionRecord {
    fn from(connection: &Connection) -> Self {
        Self {
            relation: RelationSpec {
                source: connection.source().clone(),
                target: connection.target().clone(),
                relation: connection.relation(),
                weight: connection.weight(),
                strength: connection.strength(),
                bidirectional: connection.is_bidirectional(),
                activation_delay: connection.activation_delay(),
            },
            active: connection.is_active(),
        }
    }
}

/// Point-in-time copy of the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
    pub active_scene: Option<NodeId>,
}

impl SystemSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl GraphManager {
    /// Purge every reference to a node or connection that no longer exists.
    pub fn validate_system(&mut self) -> ValidationReport {
        let mut report = ValidationReport::default();

        // Connections with a missing endpoint
        let dangling: Vec<_> = self
            .connections
            .values()
            .filter(|c| {
                !self.nodes.contains_key(c.source().as_str())
                    || !self.nodes.contains_key(c.target().as_str())
            })
            .map(|c| c.id().clone())
            .collect();
        for id in dangling {
            if self.remove_connection(&id).is_some() {
                report.dangling_connections += 1;
            }
        }

        let nodes = &self.nodes;
        let connections = &self.connections;

        self.connections_by_node.retain(|node, ids| {
            if !nodes.contains_key(node) {
                report.dangling_index_entries += ids.len().max(1);
                return false;
            }
            let before = ids.len();
            ids.retain(|id| connections.get(id).is_some_and(|c| c.involves(node)));
            report.dangling_index_entries += before - ids.len();
            true
        });

        for (node_type, ids) in self.type_index.iter_mut() {
            let before = ids.len();
            ids.retain(|id| nodes.get(id).is_some_and(|n| n.node_type() == *node_type));
            report.dangling_index_entries += before - ids.len();
        }

        for (tag, ids) in self.tag_index.iter_mut() {
            let before = ids.len();
            ids.retain(|id| nodes.get(id).is_some_and(|n| n.has_tag(tag)));
            report.dangling_index_entries += before - ids.len();
        }
        self.tag_index.retain(|_, ids| !ids.is_empty());

        let before = self.active_nodes.len();
        self.active_nodes
            .retain(|id| nodes.get(id).is_some_and(|n| n.state() == NodeState::Active));
        report.dangling_index_entries += before - self.active_nodes.len();

        report.cancelled_timers = self.scheduler.cancel_where(|task| match task {
            ScheduledTask::PropagateState {
                connection, from, ..
            } => !connections.contains_key(connection) || !nodes.contains_key(from),
            ScheduledTask::SceneTransition { scene } => !nodes.contains_key(scene),
            ScheduledTask::GenerationTick => false,
        });

        let known: HashSet<NodeId> = self.nodes.keys().cloned().collect();
        for node in self.nodes.values_mut() {
            let Some(scene) = node.scene_mut() else {
                continue;
            };
            let missing: Vec<NodeId> = scene
                .children()
                .iter()
                .filter(|child| !known.contains(*child))
                .cloned()
                .collect();
            for child in missing {
                scene.remove_child(&child);
                report.dangling_scene_children += 1;
            }
        }

        if let Some(scene) = &self.active_scene {
            if self.nodes.get(scene).and_then(|n| n.scene()).is_none() {
                self.active_scene = None;
                report.cleared_active_scene = true;
            }
        }

        if report.found_dangling() {
            warn!(purged = report.purged(), ?report, "dangling references purged");
        } else {
            debug!("graph is consistent");
        }
        report
    }

    /// Destroy every connection and node and clear all derived state.
    ///
    /// Safe to call repeatedly; the recurring generation tick is re-armed.
    pub fn reset_system(&mut self) {
        let connection_ids: Vec<_> = self.connections.keys().cloned().collect();
        for id in connection_ids {
            self.remove_connection(&id);
        }
        let node_ids: Vec<_> = self.nodes.keys().cloned().collect();
        for id in node_ids {
            self.unregister_node(&id);
        }

        self.connections_by_node.clear();
        self.type_index.clear();
        self.tag_index.clear();
        self.active_nodes.clear();
        self.active_scene = None;
        self.clear_generation_queues();
        self.scheduler.clear();
        self.arm_generation_tick();

        info!("system reset");
        self.emit(GraphEvent::SystemStateChanged {
            description: "System reset".to_string(),
        });
    }

    pub fn save_system_state(&self) -> SystemSnapshot {
        SystemSnapshot {
            nodes: self.nodes.values().map(NodeRecord::from).collect(),
            connections: self
                .connections
                .values()
                .map(ConnectionRecord::from)
                .collect(),
            active_scene: self.active_scene.clone(),
        }
    }

    /// Restoring snapshots is not supported; always returns false.
    pub fn load_system_state(&mut self, snapshot: &SystemSnapshot) -> bool {
        warn!(
            nodes = snapshot.nodes.len(),
            connections = snapshot.connections.len(),
            "loading system state is not supported"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecorder;
    use node_rules::RelationType;
    use std::time::Duration;

    fn populated() -> GraphManager {
        let mut manager = GraphManager::with_defaults();
        manager
            .register_node(Node::new("hall", "Hall", NodeType::Scene).with_tag("house"))
            .unwrap();
        manager
            .register_node(Node::new("key", "Key", NodeType::Item).with_state(NodeState::Active))
            .unwrap();
        manager
            .register_node(Node::new("door", "Door", NodeType::Item).with_state(NodeState::Locked))
            .unwrap();
        manager.add_node_to_scene("hall", "key").unwrap();
        manager
            .create_connection_between("key", "door", RelationType::Dependency)
            .unwrap();
        manager
    }

    #[test]
    fn test_consistent_graph_validates_clean() {
        let mut manager = populated();
        let report = manager.validate_system();
        assert!(!report.found_dangling());
        assert_eq!(report.purged(), 0);
    }

    #[test]
    fn test_validate_purges_dangling_references() {
        let mut manager = populated();

        // Drop the node behind the manager's back.
        manager.nodes.shift_remove("key");
        manager.active_scene = Some("key".into());

        let report = manager.validate_system();
        assert!(report.found_dangling());
        assert_eq!(report.dangling_connections, 1);
        assert_eq!(report.dangling_scene_children, 1);
        assert!(report.cleared_active_scene);
        assert!(report.dangling_index_entries >= 2);

        assert_eq!(manager.connection_count(), 0);
        assert!(manager.nodes_by_type(NodeType::Item).iter().all(|n| n.id().as_str() != "key"));
        assert!(manager.active_node_ids().is_empty());
        assert!(manager.scene_children("hall").is_empty());
        assert!(!manager.validate_system().found_dangling());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut manager = populated();
        let recorder = EventRecorder::new();
        manager.subscribe(recorder.observer());
        manager.transition_to_scene("hall", Duration::from_secs(3)).unwrap();
        manager.queue_node_generation(node_rules::NodeSpec::new("late", "Late", NodeType::Item));

        manager.reset_system();

        assert_eq!(manager.node_count(), 0);
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.pending_timers(), 0);
        assert_eq!(manager.pending_node_generations(), 0);
        assert!(manager.active_node_ids().is_empty());
        assert!(recorder.events().contains(&GraphEvent::SystemStateChanged {
            description: "System reset".into(),
        }));

        // Nothing left to fire.
        manager.advance(Duration::from_secs(5));
        assert_eq!(manager.node_count(), 0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut manager = populated();
        manager.reset_system();
        manager.reset_system();

        assert_eq!(manager.node_count(), 0);
        assert!(!manager.validate_system().found_dangling());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut manager = populated();
        manager.deactivate_connection("key_to_door_Dependency");

        let snapshot = manager.save_system_state();
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.connections.len(), 1);
        assert!(!snapshot.connections[0].active);

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["nodes"][1]["id"], "key");
        assert_eq!(json["connections"][0]["source"], "key");
        assert_eq!(json["connections"][0]["active"], false);

        assert!(!manager.load_system_state(&snapshot));
    }
}
