//! Connection definitions - typed, weighted edges and their propagation policy.

use indexmap::IndexMap;
use node_rules::{ConnectionId, NodeId, NodeState, RelationSpec, RelationType};

/// Minimum `weight * strength` for a parent link to mirror state.
pub const PARENT_PROPAGATION_THRESHOLD: f32 = 0.5;

/// A state change a connection wants applied to the node at its other end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEffect {
    pub target: NodeId,
    pub state: NodeState,
    /// The effect only applies while the target is in this state.
    pub requires: Option<NodeState>,
}

/// A directed (optionally bidirectional) relation between two nodes.
///
/// Endpoints and relation type are fixed at creation; changing them means
/// creating a new connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    source: NodeId,
    target: NodeId,
    relation: RelationType,
    weight: f32,
    strength: f32,
    bidirectional: bool,
    active: bool,
    activation_delay: f32,
    properties: IndexMap<String, String>,
}

impl Connection {
    /// Build a connection from a spec, applying the relation's direction rule.
    pub fn new(spec: &RelationSpec) -> Self {
        let bidirectional = spec
            .relation
            .forced_bidirectional()
            .unwrap_or(spec.bidirectional);

        Self {
            id: ConnectionId::derive(&spec.source, &spec.target, spec.relation),
            source: spec.source.clone(),
            target: spec.target.clone(),
            relation: spec.relation,
            weight: spec.weight.clamp(0.0, 1.0),
            strength: spec.strength.clamp(0.0, 1.0),
            bidirectional,
            active: true,
            activation_delay: spec.activation_delay.max(0.0),
            properties: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn relation(&self) -> RelationType {
        self.relation
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Seconds state propagation is deferred by.
    pub fn activation_delay(&self) -> f32 {
        self.activation_delay
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Whether `node` is either endpoint.
    pub fn involves(&self, node: &str) -> bool {
        self.source.as_str() == node || self.target.as_str() == node
    }

    /// Whether this connection leads from `a` to `b`, honouring direction.
    pub fn is_connecting(&self, a: &str, b: &str) -> bool {
        (self.source.as_str() == a && self.target.as_str() == b)
            || (self.bidirectional && self.source.as_str() == b && self.target.as_str() == a)
    }

    /// The endpoint opposite `from` in the direction propagation may travel.
    ///
    /// `None` if `from` is not an endpoint, or if it is the target of a
    /// one-way connection.
    pub fn opposite(&self, from: &str) -> Option<&NodeId> {
        if self.source.as_str() == from {
            Some(&self.target)
        } else if self.bidirectional && self.target.as_str() == from {
            Some(&self.source)
        } else {
            None
        }
    }

    /// The other endpoint, ignoring direction.
    pub fn other_endpoint(&self, from: &str) -> Option<&NodeId> {
        if self.source.as_str() == from {
            Some(&self.target)
        } else if self.target.as_str() == from {
            Some(&self.source)
        } else {
            None
        }
    }

    pub fn can_propagate_state(&self, state: NodeState) -> bool {
        self.active && self.relation.propagates_state(state)
    }

    pub fn can_propagate_interaction(&self) -> bool {
        self.active && self.relation.propagates_interaction()
    }

    /// Decide what `from` entering `new_state` does to the opposite node.
    pub fn state_effect(&self, from: &str, new_state: NodeState) -> Option<StateEffect> {
        if !self.can_propagate_state(new_state) {
            return None;
        }
        let target = self.opposite(from)?.clone();
        let from_source = self.source.as_str() == from;

        match self.relation {
            RelationType::Dependency | RelationType::Prerequisite
                if from_source && new_state == NodeState::Completed =>
            {
                Some(StateEffect {
                    target,
                    state: NodeState::Active,
                    requires: Some(NodeState::Locked),
                })
            }
            RelationType::Trigger if from_source && new_state == NodeState::Active => {
                Some(StateEffect {
                    target,
                    state: NodeState::Active,
                    requires: None,
                })
            }
            RelationType::Parent
                if self.weight * self.strength >= PARENT_PROPAGATION_THRESHOLD =>
            {
                Some(StateEffect {
                    target,
                    state: new_state,
                    requires: None,
                })
            }
            RelationType::Sequence if from_source && new_state == NodeState::Completed => {
                Some(StateEffect {
                    target,
                    state: NodeState::Active,
                    requires: None,
                })
            }
            _ => None,
        }
    }

    /// Returns true if the flag changed.
    pub(crate) fn set_active(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        true
    }

    pub(crate) fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    pub(crate) fn set_strength(&mut self, strength: f32) {
        self.strength = strength.clamp(0.0, 1.0);
    }

    pub(crate) fn set_activation_delay(&mut self, seconds: f32) {
        self.activation_delay = seconds.max(0.0);
    }

    pub(crate) fn set_property(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(relation: RelationType) -> Connection {
        Connection::new(&RelationSpec::new("a", "b", relation))
    }

    #[test]
    fn test_direction_rules() {
        let parent = Connection::new(&RelationSpec::new("a", "b", RelationType::Parent));
        assert!(parent.is_bidirectional());

        let mutual = Connection::new(&RelationSpec::new("a", "b", RelationType::Mutual));
        assert!(mutual.is_bidirectional());

        let sequence = Connection::new(
            &RelationSpec::new("a", "b", RelationType::Sequence).with_bidirectional(true),
        );
        assert!(!sequence.is_bidirectional());

        let trigger = Connection::new(
            &RelationSpec::new("a", "b", RelationType::Trigger).with_bidirectional(true),
        );
        assert!(trigger.is_bidirectional());
    }

    #[test]
    fn test_inactive_connections_never_propagate() {
        let mut parent = connection(RelationType::Parent);
        assert!(parent.can_propagate_state(NodeState::Hidden));
        assert!(parent.can_propagate_interaction());

        assert!(parent.set_active(false));
        assert!(!parent.set_active(false));
        for state in NodeState::ALL {
            assert!(!parent.can_propagate_state(state));
        }
        assert!(!parent.can_propagate_interaction());
        assert_eq!(parent.state_effect("a", NodeState::Active), None);
    }

    #[test]
    fn test_opposite_node() {
        let one_way = connection(RelationType::Dependency);
        assert_eq!(one_way.opposite("a").map(|n| n.as_str()), Some("b"));
        assert_eq!(one_way.opposite("b"), None);
        assert_eq!(one_way.opposite("z"), None);
        assert_eq!(one_way.other_endpoint("b").map(|n| n.as_str()), Some("a"));

        let mutual = connection(RelationType::Mutual);
        assert_eq!(mutual.opposite("b").map(|n| n.as_str()), Some("a"));
    }

    #[test]
    fn test_is_connecting() {
        let one_way = connection(RelationType::Trigger);
        assert!(one_way.is_connecting("a", "b"));
        assert!(!one_way.is_connecting("b", "a"));

        let two_way = connection(RelationType::Mutual);
        assert!(two_way.is_connecting("b", "a"));
    }

    #[test]
    fn test_gating_effects() {
        for relation in [RelationType::Dependency, RelationType::Prerequisite] {
            let c = connection(relation);
            assert_eq!(
                c.state_effect("a", NodeState::Completed),
                Some(StateEffect {
                    target: "b".into(),
                    state: NodeState::Active,
                    requires: Some(NodeState::Locked),
                })
            );
            assert_eq!(c.state_effect("a", NodeState::Active), None);
            assert_eq!(c.state_effect("b", NodeState::Completed), None);
        }
    }

    #[test]
    fn test_trigger_effect() {
        let c = connection(RelationType::Trigger);
        let effect = c.state_effect("a", NodeState::Active).unwrap();
        assert_eq!(effect.state, NodeState::Active);
        assert_eq!(effect.requires, None);

        // Eligible but without a state effect.
        assert!(c.can_propagate_state(NodeState::Completed));
        assert_eq!(c.state_effect("a", NodeState::Completed), None);
    }

    #[test]
    fn test_parent_threshold() {
        let strong = Connection::new(&RelationSpec::new("a", "b", RelationType::Parent));
        let effect = strong.state_effect("b", NodeState::Hidden).unwrap();
        assert_eq!(effect.target.as_str(), "a");
        assert_eq!(effect.state, NodeState::Hidden);

        let weak = Connection::new(
            &RelationSpec::new("a", "b", RelationType::Parent)
                .with_weight(0.6)
                .with_strength(0.6),
        );
        assert_eq!(weak.state_effect("a", NodeState::Active), None);

        let mut borderline = Connection::new(
            &RelationSpec::new("a", "b", RelationType::Parent).with_weight(0.5),
        );
        assert!(borderline.state_effect("a", NodeState::Active).is_some());
        borderline.set_strength(0.9);
        assert!(borderline.state_effect("a", NodeState::Active).is_none());
    }

    #[test]
    fn test_sequence_effect() {
        let c = connection(RelationType::Sequence);
        assert_eq!(
            c.state_effect("a", NodeState::Completed).map(|e| e.state),
            Some(NodeState::Active)
        );
        assert_eq!(c.state_effect("a", NodeState::Active), None);
    }

    #[test]
    fn test_mutual_and_emotional_do_not_mutate_state() {
        let mutual = connection(RelationType::Mutual);
        assert!(mutual.can_propagate_state(NodeState::Active));
        assert_eq!(mutual.state_effect("a", NodeState::Active), None);

        let emotional = connection(RelationType::Emotional);
        assert!(!emotional.can_propagate_state(NodeState::Completed));
        assert!(!emotional.can_propagate_interaction());
    }

    #[test]
    fn test_connection_id() {
        let c = connection(RelationType::Sequence);
        assert_eq!(c.id().as_str(), "a_to_b_Sequence");
    }

    #[test]
    fn test_value_clamping() {
        let mut c = connection(RelationType::Trigger);
        c.set_weight(2.0);
        c.set_strength(-1.0);
        c.set_activation_delay(-3.0);
        assert!((c.weight() - 1.0).abs() < 0.01);
        assert!(c.strength().abs() < 0.01);
        assert!(c.activation_delay().abs() < 0.01);
    }
}
