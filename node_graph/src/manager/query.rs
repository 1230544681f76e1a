//! Read-only lookups over the registries and indices.

use node_rules::{CapabilityKind, ConnectionId, NodeId, NodeState, NodeType, RelationType, Tag, Vec3};
use std::collections::{HashMap, HashSet, VecDeque};

use super::GraphManager;
use crate::graph::{Connection, Node};

/// Filter for [`GraphManager::execute_node_query`].
///
/// Empty lists match everything. All `tags` must match, hierarchically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeQuery {
    pub node_types: Vec<NodeType>,
    pub states: Vec<NodeState>,
    pub tags: Vec<Tag>,
    /// Distance origin; defaults to the manager's configured origin.
    pub origin: Option<Vec3>,
    pub max_distance: Option<f32>,
    pub include_inactive: bool,
}

impl NodeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_types.push(node_type);
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn within(mut self, origin: Vec3, max_distance: f32) -> Self {
        self.origin = Some(origin);
        self.max_distance = Some(max_distance);
        self
    }

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    fn matches(&self, node: &Node, origin: Vec3) -> bool {
        if !self.include_inactive && node.state() == NodeState::Inactive {
            return false;
        }
        if !self.node_types.is_empty() && !self.node_types.contains(&node.node_type()) {
            return false;
        }
        if !self.states.is_empty() && !self.states.contains(&node.state()) {
            return false;
        }
        if !self
            .tags
            .iter()
            .all(|wanted| node.tags().iter().any(|tag| tag.matches(wanted)))
        {
            return false;
        }
        match self.max_distance {
            Some(max) if max > 0.0 => node.position().distance_squared(&origin) <= max * max,
            _ => true,
        }
    }
}

impl GraphManager {
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.type_index
            .get(&node_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn nodes_by_state(&self, state: NodeState) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.state() == state).collect()
    }

    /// Nodes carrying exactly this tag.
    pub fn nodes_by_tag(&self, tag: &Tag) -> Vec<&Node> {
        self.tag_index
            .get(tag)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn nodes_in_radius(&self, center: Vec3, radius: f32) -> Vec<&Node> {
        let radius_squared = radius * radius;
        self.nodes
            .values()
            .filter(|n| n.position().distance_squared(&center) <= radius_squared)
            .collect()
    }

    pub fn find_nodes_with_capability(&self, kind: CapabilityKind) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.has_capability(kind))
            .collect()
    }

    /// IDs of nodes currently `Active`, in the order they became active.
    pub fn active_node_ids(&self) -> Vec<&NodeId> {
        self.active_nodes.iter().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// The connection from `source` to `target`, if any. Direction matters.
    pub fn get_connection(&self, source: &str, target: &str) -> Option<&Connection> {
        self.connections_for_node(source)
            .into_iter()
            .find(|c| c.source().as_str() == source && c.target().as_str() == target)
    }

    /// Every connection touching `node`.
    pub fn connections_for_node(&self, node: &str) -> Vec<&Connection> {
        self.connections_by_node
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
            .collect()
    }

    pub fn outgoing_connections(&self, node: &str) -> Vec<&Connection> {
        self.connections_for_node(node)
            .into_iter()
            .filter(|c| c.source().as_str() == node)
            .collect()
    }

    pub fn incoming_connections(&self, node: &str) -> Vec<&Connection> {
        self.connections_for_node(node)
            .into_iter()
            .filter(|c| c.target().as_str() == node)
            .collect()
    }

    /// Distinct neighbours, optionally over one relation type only.
    pub fn connected_nodes(&self, node: &str, relation: Option<RelationType>) -> Vec<&Node> {
        let mut seen = HashSet::new();
        self.connections_for_node(node)
            .into_iter()
            .filter(|c| relation.map_or(true, |r| c.relation() == r))
            .filter_map(|c| c.other_endpoint(node))
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Shortest hop path from `start` to `end` over every connection, ignoring
    /// direction and the connection's active flag. Empty if unreachable or `start == end`.
    pub fn find_path(&self, start: &str, end: &str) -> Vec<NodeId> {
        if start == end || !self.nodes.contains_key(start) || !self.nodes.contains_key(end) {
            return Vec::new();
        }

        let mut came_from: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut queue = VecDeque::new();
        let Some((start_id, _)) = self.nodes.get_key_value(start) else {
            return Vec::new();
        };
        let mut visited: HashSet<&NodeId> = HashSet::from([start_id]);
        queue.push_back(start_id);

        while let Some(current) = queue.pop_front() {
            if current.as_str() == end {
                let mut path = vec![current.clone()];
                let mut step = current;
                while let Some(&previous) = came_from.get(step) {
                    path.push(previous.clone());
                    step = previous;
                }
                path.reverse();
                return path;
            }

            for connection in self.connections_for_node(current) {
                let Some(next) = connection.other_endpoint(current) else {
                    continue;
                };
                if visited.insert(next) {
                    came_from.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        Vec::new()
    }

    /// Depth-first walk from `root` over scene children and outgoing connections.
    ///
    /// Each node appears once, root first.
    pub fn node_hierarchy(&self, root: &str) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(root)
            .map(|n| vec![n.id().clone()])
            .unwrap_or_default();

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let children: Vec<NodeId> = self
                .scene_children(&id)
                .into_iter()
                .chain(self.outgoing_connections(&id).into_iter().map(|c| c.target().clone()))
                .filter(|child| !seen.contains(child))
                .collect();
            // Reverse so the first child is visited first.
            stack.extend(children.into_iter().rev());
            order.push(id);
        }

        order
    }

    /// Nodes matching every criterion in `query`, in registration order.
    pub fn execute_node_query(&self, query: &NodeQuery) -> Vec<&Node> {
        let origin = query.origin.unwrap_or(self.config.origin);
        self.nodes
            .values()
            .filter(|n| query.matches(n, origin))
            .collect()
    }

    /// IDs of the connections touching `node`.
    pub fn connection_ids_for_node(&self, node: &str) -> Vec<ConnectionId> {
        self.connections_by_node.get(node).cloned().unwrap_or_default()
    }
}
