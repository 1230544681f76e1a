//! Entity definitions for the node graph.

mod spatial;
mod spec;
mod tag;

pub use spatial::*;
pub use spec::*;
pub use tag::*;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::ops::Deref;
use uuid::Uuid;

use crate::mechanics::RelationType;

/// Unique, immutable identifier of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random node ID.
    pub fn generate() -> Self {
        Self(format!("node_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a connection, derived from its endpoints and relation type.
///
/// Underscores inside node IDs are doubled, so distinct endpoint pairs never
/// share an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Derive the identifier for `source -> target` with the given relation.
    pub fn derive(source: &str, target: &str, relation: RelationType) -> Self {
        Self(format!(
            "{}_to_{}_{}",
            source.replace('_', "__"),
            target.replace('_', "__"),
            relation.name()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ConnectionId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ConnectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gameplay category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeType {
    Scene,
    #[default]
    Item,
    Trigger,
    Story,
    Custom,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Scene,
        NodeType::Item,
        NodeType::Trigger,
        NodeType::Story,
        NodeType::Custom,
    ];

    /// Case-insensitive parse; anything unrecognized becomes `Item`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "scene" => NodeType::Scene,
            "item" => NodeType::Item,
            "trigger" => NodeType::Trigger,
            "story" => NodeType::Story,
            _ => NodeType::Item,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Scene => "Scene",
            NodeType::Item => "Item",
            NodeType::Trigger => "Trigger",
            NodeType::Story => "Story",
            NodeType::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeState {
    #[default]
    Inactive,
    Active,
    Completed,
    Locked,
    Hidden,
}

impl NodeState {
    pub const ALL: [NodeState; 5] = [
        NodeState::Inactive,
        NodeState::Active,
        NodeState::Completed,
        NodeState::Locked,
        NodeState::Hidden,
    ];

    /// Case-insensitive parse; anything unrecognized becomes `Inactive`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => NodeState::Active,
            "inactive" => NodeState::Inactive,
            "completed" => NodeState::Completed,
            "locked" => NodeState::Locked,
            "hidden" => NodeState::Hidden,
            _ => NodeState::Inactive,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeState::Inactive => "Inactive",
            NodeState::Active => "Active",
            NodeState::Completed => "Completed",
            NodeState::Locked => "Locked",
            NodeState::Hidden => "Hidden",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Behaviour class a node is spawned with.
///
/// Scene nodes own an ordered child list, item nodes own capabilities, basic
/// nodes carry only the shared state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Basic,
    Scene,
    Item,
}

impl NodeClass {
    /// The default class for a node type.
    pub fn for_type(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Scene => NodeClass::Scene,
            NodeType::Item => NodeClass::Item,
            NodeType::Trigger | NodeType::Story | NodeType::Custom => NodeClass::Basic,
        }
    }
}
