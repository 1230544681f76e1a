//! Spawn specifications - what the graph manager consumes to create nodes and relations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{NodeClass, NodeId, NodeState, NodeType, Tag, Vec3};
use crate::mechanics::{CapabilitySpec, EmotionData, RelationType};

/// Everything needed to spawn one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub node_type: NodeType,
    pub initial_state: NodeState,

    /// Behaviour class to spawn. `None` makes node creation fail.
    pub class: Option<NodeClass>,

    /// Explicit spawn position. When absent the manager picks a random one.
    pub position: Option<Vec3>,

    pub tags: Vec<Tag>,
    pub properties: IndexMap<String, String>,
    pub interactable: bool,

    /// Maximum instigator distance for interactions, if any.
    pub interaction_range: Option<f32>,

    pub story_fragment: String,
    pub trigger_event_ids: Vec<String>,

    /// Capabilities attached when the node is spawned with the item class.
    pub capabilities: Vec<CapabilitySpec>,

    /// Relations created together with the node by the generation queue.
    pub relations: Vec<RelationSpec>,

    pub emotion: Option<EmotionData>,
}

impl NodeSpec {
    /// Create a spec with the default class for `node_type`.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            node_type,
            initial_state: NodeState::Inactive,
            class: Some(NodeClass::for_type(node_type)),
            position: None,
            tags: Vec::new(),
            properties: IndexMap::new(),
            interactable: true,
            interaction_range: None,
            story_fragment: String::new(),
            trigger_event_ids: Vec::new(),
            capabilities: Vec::new(),
            relations: Vec::new(),
            emotion: None,
        }
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_class(mut self, class: Option<NodeClass>) -> Self {
        self.class = class;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_interactable(mut self, interactable: bool) -> Self {
        self.interactable = interactable;
        self
    }

    pub fn with_interaction_range(mut self, range: f32) -> Self {
        self.interaction_range = Some(range.max(0.0));
        self
    }

    pub fn with_story_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.story_fragment = fragment.into();
        self
    }

    pub fn with_trigger_event(mut self, event_id: impl Into<String>) -> Self {
        self.trigger_event_ids.push(event_id.into());
        self
    }

    pub fn with_capability(mut self, capability: CapabilitySpec) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionData) -> Self {
        self.emotion = Some(emotion);
        self
    }
}

/// A requested relation between two nodes, resolved by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: RelationType,
    /// Weight from 0.0 to 1.0.
    pub weight: f32,
    /// Strength from 0.0 to 1.0.
    pub strength: f32,
    pub bidirectional: bool,
    /// Seconds to defer state propagation by; zero propagates immediately.
    pub activation_delay: f32,
}

impl RelationSpec {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, relation: RelationType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation,
            weight: 1.0,
            strength: 1.0,
            bidirectional: false,
            activation_delay: 0.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    pub fn with_activation_delay(mut self, seconds: f32) -> Self {
        self.activation_delay = seconds.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_class_from_type() {
        let spec = NodeSpec::new("hall", "Great Hall", NodeType::Scene);
        assert_eq!(spec.class, Some(NodeClass::Scene));
        assert_eq!(spec.initial_state, NodeState::Inactive);
        assert!(spec.interactable);

        let story = NodeSpec::new("ending", "Ending", NodeType::Story);
        assert_eq!(story.class, Some(NodeClass::Basic));
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let spec = NodeSpec::new("a", "A", NodeType::Item)
            .with_tag("forest")
            .with_tag("forest")
            .with_tag("night");
        assert_eq!(spec.tags.len(), 2);
    }

    #[test]
    fn test_relation_clamping() {
        let relation = RelationSpec::new("a", "b", RelationType::Parent)
            .with_weight(1.7)
            .with_strength(-0.2)
            .with_activation_delay(-1.0);
        assert!((relation.weight - 1.0).abs() < 0.01);
        assert!(relation.strength.abs() < 0.01);
        assert!(relation.activation_delay.abs() < 0.01);
    }
}
