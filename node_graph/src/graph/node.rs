//! Node definitions - the stateful vertices of the graph.

use indexmap::IndexMap;
use node_rules::{
    CapabilityKind, EmotionData, InteractionData, NodeClass, NodeId, NodeSpec, NodeState,
    NodeType, Tag, Vec3,
};
use std::rc::Rc;

use crate::capability::{Capability, CapabilityBehaviour};

/// Extra rules deciding whether an interaction is allowed.
pub trait InteractionValidator {
    fn validate(&self, node: &Node, interaction: &InteractionData) -> bool;
}

impl<F> InteractionValidator for F
where
    F: Fn(&Node, &InteractionData) -> bool,
{
    fn validate(&self, node: &Node, interaction: &InteractionData) -> bool {
        self(node, interaction)
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub old: NodeState,
    pub new: NodeState,
}

/// Scene-specific data: an ordered list of children.
#[derive(Debug, Default)]
pub struct SceneData {
    children: Vec<NodeId>,
    triggered_events: Vec<String>,
    is_active_scene: bool,
}

impl SceneData {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Story events raised by children while in this scene.
    pub fn triggered_events(&self) -> &[String] {
        &self.triggered_events
    }

    pub fn is_active_scene(&self) -> bool {
        self.is_active_scene
    }
}

/// Item-specific data: the attached capabilities.
#[derive(Debug, Default)]
pub struct ItemData {
    capabilities: Vec<CapabilityBehaviour>,
}

/// Behaviour variant of a node, chosen by its [`NodeClass`].
#[derive(Debug)]
pub enum NodeKind {
    Basic,
    Scene(SceneData),
    Item(ItemData),
}

impl NodeKind {
    fn for_class(class: NodeClass) -> Self {
        match class {
            NodeClass::Basic => NodeKind::Basic,
            NodeClass::Scene => NodeKind::Scene(SceneData::default()),
            NodeClass::Item => NodeKind::Item(ItemData::default()),
        }
    }
}

/// A node in the graph.
///
/// The lifecycle state is private: it only changes through the manager, which
/// pairs every transition with its notifications and propagation.
pub struct Node {
    id: NodeId,
    name: String,
    description: String,
    node_type: NodeType,
    state: NodeState,
    kind: NodeKind,

    tags: Vec<Tag>,
    properties: IndexMap<String, String>,
    position: Vec3,

    interactable: bool,
    /// Maximum instigator distance accepted by the default validation.
    interaction_range: Option<f32>,
    validator: Option<Rc<dyn InteractionValidator>>,

    story_fragment: String,
    trigger_event_ids: Vec<String>,
    story_context: IndexMap<String, String>,
    emotion: Option<EmotionData>,
}

impl Node {
    /// Create an inactive node whose class follows its type.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            node_type,
            state: NodeState::Inactive,
            kind: NodeKind::for_class(NodeClass::for_type(node_type)),
            tags: Vec::new(),
            properties: IndexMap::new(),
            position: Vec3::ZERO,
            interactable: true,
            interaction_range: None,
            validator: None,
            story_fragment: String::new(),
            trigger_event_ids: Vec::new(),
            story_context: IndexMap::new(),
            emotion: None,
        }
    }

    /// Build a node from a spawn spec. Capabilities are attached separately.
    pub fn from_spec(spec: &NodeSpec, class: NodeClass, position: Vec3) -> Self {
        let mut node = Node::new(spec.id.clone(), spec.name.clone(), spec.node_type)
            .with_class(class)
            .with_state(spec.initial_state)
            .with_position(position)
            .with_interactable(spec.interactable);

        node.description = spec.description.clone();
        node.interaction_range = spec.interaction_range;
        node.properties = spec.properties.clone();
        node.story_fragment = spec.story_fragment.clone();
        node.trigger_event_ids = spec.trigger_event_ids.clone();
        for tag in &spec.tags {
            node.add_tag(tag.clone());
        }

        if let Some(emotion) = spec.emotion {
            node.emotion = Some(emotion);
            if emotion.intensity > 0.0 {
                node.story_context
                    .insert("EmotionType".into(), format!("{:?}", emotion.primary));
                node.story_context
                    .insert("EmotionIntensity".into(), format!("{:.2}", emotion.intensity));
            }
        }

        node
    }

    /// Replace the behaviour variant. Any attached capabilities or children are dropped.
    pub fn with_class(mut self, class: NodeClass) -> Self {
        self.kind = NodeKind::for_class(class);
        self
    }

    /// Set the initial state. This is not a transition and raises nothing.
    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.add_tag(tag.into());
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
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

    pub fn with_validator(mut self, validator: impl InteractionValidator + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
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

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn class(&self) -> NodeClass {
        match self.kind {
            NodeKind::Basic => NodeClass::Basic,
            NodeKind::Scene(_) => NodeClass::Scene,
            NodeKind::Item(_) => NodeClass::Item,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_interactable(&self) -> bool {
        self.interactable
    }

    pub fn story_fragment(&self) -> &str {
        &self.story_fragment
    }

    pub fn trigger_event_ids(&self) -> &[String] {
        &self.trigger_event_ids
    }

    pub fn story_context(&self) -> &IndexMap<String, String> {
        &self.story_context
    }

    pub fn emotion(&self) -> Option<&EmotionData> {
        self.emotion.as_ref()
    }

    pub fn scene(&self) -> Option<&SceneData> {
        match &self.kind {
            NodeKind::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &CapabilityBehaviour> {
        let capabilities = match &self.kind {
            NodeKind::Item(item) => item.capabilities.as_slice(),
            _ => &[],
        };
        capabilities.iter()
    }

    pub fn has_capability(&self, kind: CapabilityKind) -> bool {
        self.capabilities().any(|c| c.kind() == kind)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_interactable(&mut self, interactable: bool) {
        self.interactable = interactable;
    }

    pub fn set_validator(&mut self, validator: impl InteractionValidator + 'static) {
        self.validator = Some(Rc::new(validator));
    }

    pub fn set_story_fragment(&mut self, fragment: impl Into<String>) {
        self.story_fragment = fragment.into();
    }

    pub fn add_trigger_event(&mut self, event_id: impl Into<String>) {
        let event_id = event_id.into();
        if !self.trigger_event_ids.contains(&event_id) {
            self.trigger_event_ids.push(event_id);
        }
    }

    /// Whether an interaction is currently allowed.
    ///
    /// Disabled and hidden nodes never accept interactions. Otherwise a custom
    /// validator decides if one is installed; the default check rejects
    /// instigators standing outside `interaction_range`.
    pub fn can_interact(&self, interaction: &InteractionData) -> bool {
        if !self.interactable || self.state == NodeState::Hidden {
            return false;
        }

        match &self.validator {
            Some(validator) => validator.validate(self, interaction),
            None => self.within_range(interaction),
        }
    }

    fn within_range(&self, interaction: &InteractionData) -> bool {
        match (self.interaction_range, interaction.instigator_position) {
            (Some(range), Some(position)) if range > 0.0 => {
                position.distance_squared(&self.position) <= range * range
            }
            _ => true,
        }
    }

    /// Fraction of `keys` on which both nodes carry the same property value.
    pub fn property_similarity(&self, other: &Node, keys: &[String]) -> f32 {
        if keys.is_empty() {
            return 0.0;
        }
        let matching = keys
            .iter()
            .filter(|key| {
                self.property(key)
                    .is_some_and(|value| other.property(key) == Some(value))
            })
            .count();
        matching as f32 / keys.len() as f32
    }

    /// Whether interacting with this node raises a story trigger.
    pub fn should_trigger_story(&self) -> bool {
        !self.story_fragment.is_empty() || !self.trigger_event_ids.is_empty()
    }

    /// Swap the state, returning the transition if anything changed.
    pub(crate) fn set_state(&mut self, new: NodeState) -> Option<StateTransition> {
        if self.state == new {
            return None;
        }
        let old = std::mem::replace(&mut self.state, new);
        Some(StateTransition { old, new })
    }

    pub(crate) fn add_tag(&mut self, tag: Tag) -> bool {
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub(crate) fn remove_tag(&mut self, tag: &Tag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub(crate) fn scene_mut(&mut self) -> Option<&mut SceneData> {
        match &mut self.kind {
            NodeKind::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    /// Attach a capability. Only item nodes carry capabilities.
    pub(crate) fn attach_capability(&mut self, capability: CapabilityBehaviour) -> bool {
        match &mut self.kind {
            NodeKind::Item(item) => {
                item.capabilities.push(capability);
                true
            }
            _ => false,
        }
    }

    /// Temporarily move the capabilities out so they can read the graph while mutating.
    pub(crate) fn take_capabilities(&mut self) -> Vec<CapabilityBehaviour> {
        match &mut self.kind {
            NodeKind::Item(item) => std::mem::take(&mut item.capabilities),
            _ => Vec::new(),
        }
    }

    pub(crate) fn restore_capabilities(&mut self, capabilities: Vec<CapabilityBehaviour>) {
        if let NodeKind::Item(item) = &mut self.kind {
            item.capabilities = capabilities;
        }
    }

    pub(crate) fn notify_capabilities(&mut self, state: NodeState) {
        if let NodeKind::Item(item) = &mut self.kind {
            for capability in item.capabilities.iter_mut() {
                capability.on_owner_state_changed(state);
            }
        }
    }

    /// Advance capability cooldowns, scaled by any system capability's time scale.
    pub(crate) fn tick_capabilities(&mut self, seconds: f32) {
        if let NodeKind::Item(item) = &mut self.kind {
            let scale: f32 = item
                .capabilities
                .iter()
                .filter_map(|c| c.time_scale())
                .product();
            for capability in item.capabilities.iter_mut() {
                capability.tick(seconds * scale);
            }
        }
    }
}

impl SceneData {
    pub(crate) fn add_child(&mut self, child: NodeId) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    pub(crate) fn remove_child(&mut self, child: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.as_str() != child);
        self.children.len() != before
    }

    pub(crate) fn record_events(&mut self, event_ids: &[String]) {
        for event_id in event_ids {
            if !self.triggered_events.contains(event_id) {
                self.triggered_events.push(event_id.clone());
            }
        }
    }

    pub(crate) fn set_active_scene(&mut self, active: bool) -> bool {
        if self.is_active_scene == active {
            return false;
        }
        self.is_active_scene = active;
        true
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("node_type", &self.node_type)
            .field("state", &self.state)
            .field("class", &self.class())
            .field("tags", &self.tags)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
