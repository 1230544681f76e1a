//! Connection lifecycle: creation, removal and runtime tuning.

use node_rules::{ConnectionId, NodeId, RelationSpec, RelationType};
use tracing::{debug, info, warn};

use super::{GraphManager, ScheduledTask};
use crate::capability::Capability;
use crate::error::{GraphError, GraphResult};
use crate::events::GraphEvent;
use crate::graph::Connection;

impl GraphManager {
    /// Create a connection, or return the one already linking the same ordered pair.
    pub fn create_connection(&mut self, spec: &RelationSpec) -> GraphResult<ConnectionId> {
        for endpoint in [&spec.source, &spec.target] {
            if !self.nodes.contains_key(endpoint.as_str()) {
                warn!(node = %endpoint, "cannot connect unknown node");
                return Err(GraphError::NodeNotFound(endpoint.clone()));
            }
        }
        if spec.source == spec.target {
            warn!(node = %spec.source, "cannot connect node to itself");
            return Err(GraphError::SelfLoop(spec.source.clone()));
        }

        if let Some(existing) = self.find_ordered_connection(&spec.source, &spec.target) {
            debug!(connection = %existing, "connection already exists");
            return Ok(existing.clone());
        }

        for endpoint in [&spec.source, &spec.target] {
            if let Some(limit) = self.connection_limit(endpoint) {
                let count = self
                    .connections_by_node
                    .get(endpoint.as_str())
                    .map_or(0, Vec::len);
                if count >= limit {
                    warn!(node = %endpoint, limit, "connection limit reached");
                    return Err(GraphError::ConnectionLimit {
                        node: endpoint.clone(),
                        limit,
                    });
                }
            }
        }

        let connection = Connection::new(spec);
        let id = connection.id().clone();
        if self.connections.contains_key(&id) {
            warn!(connection = %id, "connection id already taken");
            return Err(GraphError::DuplicateConnection(id));
        }

        // Index under both endpoints
        for endpoint in [&spec.source, &spec.target] {
            self.connections_by_node
                .entry(endpoint.clone())
                .or_default()
                .push(id.clone());
        }
        self.connections.insert(id.clone(), connection);

        info!(
            connection = %id,
            source = %spec.source,
            target = %spec.target,
            relation = %spec.relation,
            "connection created"
        );
        self.emit(GraphEvent::ConnectionCreated {
            connection: id.clone(),
        });
        Ok(id)
    }

    /// Create a full-weight connection with default settings.
    pub fn create_connection_between(
        &mut self,
        source: &str,
        target: &str,
        relation: RelationType,
    ) -> GraphResult<ConnectionId> {
        self.create_connection(&RelationSpec::new(source, target, relation))
    }

    /// The tightest connection limit for a node: configuration or capability.
    pub fn connection_limit(&self, node: &str) -> Option<usize> {
        let from_capabilities = self
            .nodes
            .get(node)
            .into_iter()
            .flat_map(|n| n.capabilities())
            .filter_map(|c| c.relationship_limit());

        self.config
            .max_connections_per_node
            .into_iter()
            .chain(from_capabilities)
            .min()
    }

    fn find_ordered_connection(&self, source: &NodeId, target: &NodeId) -> Option<&ConnectionId> {
        self.connections_by_node
            .get(source.as_str())?
            .iter()
            .find(|id| {
                self.connections
                    .get(id.as_str())
                    .is_some_and(|c| c.source() == source && c.target() == target)
            })
    }

    /// Compare `node` with `other` using the node's similarity rule and link
    /// them with a mutual connection when they are similar enough.
    ///
    /// Returns `Ok(None)` when the node has no rule or the pair falls short.
    pub fn compare_nodes(&mut self, node: &str, other: &str) -> GraphResult<Option<ConnectionId>> {
        let owner = self
            .nodes
            .get(node)
            .ok_or_else(|| GraphError::NodeNotFound(node.into()))?;
        let candidate = self
            .nodes
            .get(other)
            .ok_or_else(|| GraphError::NodeNotFound(other.into()))?;

        let Some((keys, threshold)) = owner.capabilities().find_map(|c| c.similarity_rule()) else {
            debug!(node, "no similarity rule");
            return Ok(None);
        };
        let similarity = owner.property_similarity(candidate, keys);
        if similarity < threshold {
            debug!(node, other, similarity, threshold, "nodes not similar enough");
            return Ok(None);
        }

        info!(node, other, similarity, "nodes are similar");
        self.create_connection_between(node, other, RelationType::Mutual)
            .map(Some)
    }

    /// Remove one connection from the registry and both endpoint indices.
    pub fn remove_connection(&mut self, id: &str) -> Option<Connection> {
        let connection = self.connections.shift_remove(id)?;

        for endpoint in [connection.source(), connection.target()] {
            if let Some(ids) = self.connections_by_node.get_mut(endpoint.as_str()) {
                ids.retain(|c| c.as_str() != id);
            }
        }
        self.scheduler.cancel_where(|task| task.targets_connection(id));

        debug!(connection = id, "connection removed");
        self.emit(GraphEvent::ConnectionRemoved {
            connection: connection.id().clone(),
        });
        Some(connection)
    }

    /// Remove every connection leading from `a` to `b`.
    pub fn remove_connections_between(&mut self, a: &str, b: &str) -> usize {
        let doomed: Vec<ConnectionId> = self
            .connections_for_node(a)
            .into_iter()
            .filter(|c| c.is_connecting(a, b))
            .map(|c| c.id().clone())
            .collect();

        doomed
            .iter()
            .filter(|id| self.remove_connection(id).is_some())
            .count()
    }

    /// Remove every connection touching `node`.
    pub fn remove_all_connections_for_node(&mut self, node: &str) -> usize {
        let doomed = self
            .connections_by_node
            .get(node)
            .cloned()
            .unwrap_or_default();

        doomed
            .iter()
            .filter(|id| self.remove_connection(id).is_some())
            .count()
    }

    pub fn activate_connection(&mut self, id: &str) -> bool {
        self.set_connection_active(id, true)
    }

    pub fn deactivate_connection(&mut self, id: &str) -> bool {
        self.set_connection_active(id, false)
    }

    fn set_connection_active(&mut self, id: &str, active: bool) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        if !connection.set_active(active) {
            return false;
        }

        let connection = connection.id().clone();
        debug!(connection = %connection, active, "connection toggled");
        self.emit(if active {
            GraphEvent::ConnectionActivated { connection }
        } else {
            GraphEvent::ConnectionDeactivated { connection }
        });
        true
    }

    pub fn set_connection_weight(&mut self, id: &str, weight: f32) -> bool {
        self.connections
            .get_mut(id)
            .map(|c| c.set_weight(weight))
            .is_some()
    }

    pub fn set_connection_strength(&mut self, id: &str, strength: f32) -> bool {
        self.connections
            .get_mut(id)
            .map(|c| c.set_strength(strength))
            .is_some()
    }

    /// Change the propagation delay. Already scheduled propagations keep their time.
    pub fn set_connection_activation_delay(&mut self, id: &str, seconds: f32) -> bool {
        self.connections
            .get_mut(id)
            .map(|c| c.set_activation_delay(seconds))
            .is_some()
    }

    pub fn set_connection_property(
        &mut self,
        id: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        self.connections
            .get_mut(id)
            .map(|c| c.set_property(key.into(), value.into()))
            .is_some()
    }

    /// Emit a visual pulse along an active connection.
    pub fn pulse_connection(&mut self, id: &str) -> bool {
        let Some(connection) = self.connections.get(id).filter(|c| c.is_active()) else {
            return false;
        };
        let connection = connection.id().clone();
        self.emit(GraphEvent::ConnectionPulsed { connection });
        true
    }

    pub(super) fn schedule_propagation(
        &mut self,
        connection: &ConnectionId,
        from: &NodeId,
        state: node_rules::NodeState,
        delay: f32,
    ) {
        let Some(delay) = super::scheduler::seconds(delay) else {
            warn!(connection = %connection, delay, "activation delay out of range, dropping propagation");
            return;
        };
        let task = ScheduledTask::PropagateState {
            connection: connection.clone(),
            from: from.clone(),
            state,
        };
        if self.scheduler.schedule(delay, task).is_some() {
            debug!(connection = %connection, ?delay, "propagation deferred");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecorder;
    use crate::graph::Node;
    use node_rules::{
        CapabilityConfig, CapabilitySpec, GraphConfig, InteractiveConfig, NodeSpec, NodeState,
        NodeType, SystemConfig,
    };

    fn manager_with(ids: &[&str]) -> GraphManager {
        let mut manager = GraphManager::with_defaults();
        for id in ids {
            manager
                .register_node(Node::new(*id, id.to_uppercase(), NodeType::Item))
                .unwrap();
        }
        manager
    }

    #[test]
    fn test_create_connection_indexes_both_endpoints() {
        let mut manager = manager_with(&["a", "b"]);
        let id = manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();

        assert_eq!(id.as_str(), "a_to_b_Trigger");
        assert_eq!(manager.connections_for_node("a").len(), 1);
        assert_eq!(manager.connections_for_node("b").len(), 1);
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn test_create_connection_validation() {
        let mut manager = manager_with(&["a"]);

        assert_eq!(
            manager.create_connection_between("a", "ghost", RelationType::Trigger),
            Err(GraphError::NodeNotFound("ghost".into()))
        );
        assert_eq!(
            manager.create_connection_between("a", "a", RelationType::Trigger),
            Err(GraphError::SelfLoop("a".into()))
        );
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_underscored_ids_keep_connections_apart() {
        let mut manager = manager_with(&["x_to_y", "z", "x", "y_to_z"]);
        let first = manager
            .create_connection_between("x_to_y", "z", RelationType::Trigger)
            .unwrap();
        let second = manager
            .create_connection_between("x", "y_to_z", RelationType::Trigger)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.connection_count(), 2);
        assert!(manager.get_connection("x_to_y", "z").is_some());
        assert!(manager.get_connection("x", "y_to_z").is_some());

        manager.set_node_state("x_to_y", NodeState::Active);
        assert_eq!(manager.get_node("z").unwrap().state(), NodeState::Active);
        assert!(!manager.validate_system().found_dangling());

        manager.unregister_node("x_to_y");
        assert_eq!(manager.connections_for_node("x").len(), 1);
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn test_taken_connection_id_is_refused() {
        let mut manager = manager_with(&["a", "b"]);
        let id = manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();
        // Drop the index entry so the ordered-pair lookup misses.
        manager.connections_by_node.clear();

        assert_eq!(
            manager.create_connection_between("a", "b", RelationType::Trigger),
            Err(GraphError::DuplicateConnection(id))
        );
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn test_existing_ordered_pair_is_returned() {
        let mut manager = manager_with(&["a", "b"]);
        let first = manager
            .create_connection_between("a", "b", RelationType::Dependency)
            .unwrap();
        let second = manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.connection_count(), 1);

        // The reverse pair is a different connection.
        let reverse = manager
            .create_connection_between("b", "a", RelationType::Dependency)
            .unwrap();
        assert_ne!(first, reverse);
        assert_eq!(manager.connection_count(), 2);
    }

    #[test]
    fn test_connection_limit_from_config() {
        let mut manager = GraphManager::new(GraphConfig {
            max_connections_per_node: Some(1),
            ..Default::default()
        });
        for id in ["a", "b", "c"] {
            manager
                .register_node(Node::new(id, id, NodeType::Item))
                .unwrap();
        }

        manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();
        assert_eq!(
            manager.create_connection_between("a", "c", RelationType::Trigger),
            Err(GraphError::ConnectionLimit {
                node: "a".into(),
                limit: 1
            })
        );
    }

    #[test]
    fn test_connection_limit_from_capability() {
        let mut manager = manager_with(&["b", "c", "d"]);
        let system = SystemConfig {
            max_relationships: 2,
            ..Default::default()
        };
        let spec = NodeSpec::new("hub", "Hub", NodeType::Item)
            .with_capability(CapabilitySpec::new(CapabilityConfig::System(system)));
        manager.create_node(spec.class, &spec).unwrap();

        assert_eq!(manager.connection_limit("hub"), Some(2));
        manager
            .create_connection_between("hub", "b", RelationType::Trigger)
            .unwrap();
        manager
            .create_connection_between("c", "hub", RelationType::Trigger)
            .unwrap();
        assert!(manager
            .create_connection_between("hub", "d", RelationType::Trigger)
            .is_err());
    }

    #[test]
    fn test_remove_connection_cleans_indices() {
        let mut manager = manager_with(&["a", "b"]);
        let recorder = EventRecorder::new();
        manager.subscribe(recorder.observer());

        let id = manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();
        let removed = manager.remove_connection(&id).unwrap();

        assert_eq!(removed.source().as_str(), "a");
        assert!(manager.connections_for_node("a").is_empty());
        assert!(manager.connections_for_node("b").is_empty());
        assert!(manager.remove_connection(&id).is_none());
        assert_eq!(
            recorder.count(|e| matches!(e, GraphEvent::ConnectionRemoved { .. })),
            1
        );
    }

    #[test]
    fn test_remove_connections_between_honours_direction() {
        let mut manager = manager_with(&["a", "b"]);
        manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();

        assert_eq!(manager.remove_connections_between("b", "a"), 0);
        assert_eq!(manager.remove_connections_between("a", "b"), 1);

        // Mutual connections are bidirectional, so either order matches.
        manager
            .create_connection_between("a", "b", RelationType::Mutual)
            .unwrap();
        assert_eq!(manager.remove_connections_between("b", "a"), 1);
    }

    #[test]
    fn test_unregister_cascades_connections() {
        let mut manager = manager_with(&["a", "b", "c"]);
        manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();
        manager
            .create_connection_between("c", "a", RelationType::Dependency)
            .unwrap();
        manager
            .create_connection_between("b", "c", RelationType::Dependency)
            .unwrap();

        manager.unregister_node("a");

        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.connections_for_node("b").len(), 1);
        assert_eq!(manager.connections_for_node("c").len(), 1);
    }

    #[test]
    fn test_activation_toggles_and_pulse() {
        let mut manager = manager_with(&["a", "b"]);
        let recorder = EventRecorder::new();
        manager.subscribe(recorder.observer());
        let id = manager
            .create_connection_between("a", "b", RelationType::Trigger)
            .unwrap();

        assert!(manager.pulse_connection(&id));
        assert!(manager.deactivate_connection(&id));
        assert!(!manager.deactivate_connection(&id));
        assert!(!manager.pulse_connection(&id));
        assert!(manager.activate_connection(&id));

        let toggles = recorder.count(|e| {
            matches!(
                e,
                GraphEvent::ConnectionActivated { .. } | GraphEvent::ConnectionDeactivated { .. }
            )
        });
        assert_eq!(toggles, 2);
        assert_eq!(
            recorder.count(|e| matches!(e, GraphEvent::ConnectionPulsed { .. })),
            1
        );
    }

    #[test]
    fn test_tuning_is_clamped() {
        let mut manager = manager_with(&["a", "b"]);
        let id = manager
            .create_connection_between("a", "b", RelationType::Parent)
            .unwrap();

        assert!(manager.set_connection_weight(&id, 3.0));
        assert!(manager.set_connection_strength(&id, -1.0));
        assert!(manager.set_connection_activation_delay(&id, -5.0));
        assert!(manager.set_connection_property(&id, "Label", "bond"));
        assert!(!manager.set_connection_weight("missing", 0.5));

        let connection = manager.connection(&id).unwrap();
        assert_eq!(connection.weight(), 1.0);
        assert_eq!(connection.strength(), 0.0);
        assert_eq!(connection.activation_delay(), 0.0);
        assert_eq!(connection.property("Label"), Some("bond"));
    }

    #[test]
    fn test_similar_nodes_become_mutual() {
        let mut manager = GraphManager::with_defaults();
        let config = InteractiveConfig {
            comparison_keys: vec!["era".into(), "maker".into()],
            comparison_threshold: 0.5,
            ..Default::default()
        };
        let spec = NodeSpec::new("vase", "Vase", NodeType::Item)
            .with_property("era", "ming")
            .with_property("maker", "unknown")
            .with_capability(CapabilitySpec::new(CapabilityConfig::Interactive(config)));
        manager.create_node(spec.class, &spec).unwrap();
        manager
            .register_node(Node::new("bowl", "Bowl", NodeType::Item).with_property("era", "ming"))
            .unwrap();
        manager
            .register_node(Node::new("cup", "Cup", NodeType::Item).with_property("era", "qing"))
            .unwrap();

        assert_eq!(manager.compare_nodes("vase", "cup"), Ok(None));
        let linked = manager.compare_nodes("vase", "bowl").unwrap().unwrap();
        let connection = manager.connection(&linked).unwrap();
        assert_eq!(connection.relation(), RelationType::Mutual);
        assert!(connection.is_bidirectional());

        // Nodes without a rule never compare.
        assert_eq!(manager.compare_nodes("bowl", "vase"), Ok(None));
        assert!(manager.compare_nodes("vase", "ghost").is_err());
    }
}
