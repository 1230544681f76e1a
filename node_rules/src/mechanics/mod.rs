//! Graph mechanics: relation semantics, interactions and capability configuration.

mod capability;
mod interaction;

pub use capability::*;
pub use interaction::*;

use serde::{Deserialize, Serialize};

use crate::entities::NodeState;

/// The kind of relation a connection expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RelationType {
    /// Target unlocks when the source completes.
    #[default]
    Dependency,
    /// Target unlocks when the source completes; all prerequisites gate manager-level activation.
    Prerequisite,
    /// Source activation activates the target.
    Trigger,
    /// Peers that share interactions.
    Mutual,
    /// State mirrors across a strong enough link.
    Parent,
    /// Completing the source advances to the target.
    Sequence,
    /// Carries no state, reserved for capability-level effects.
    Emotional,
}

impl RelationType {
    pub const ALL: [RelationType; 7] = [
        RelationType::Dependency,
        RelationType::Prerequisite,
        RelationType::Trigger,
        RelationType::Mutual,
        RelationType::Parent,
        RelationType::Sequence,
        RelationType::Emotional,
    ];

    /// Whether a node entering `state` is eligible to propagate along this relation.
    pub fn propagates_state(self, state: NodeState) -> bool {
        match self {
            RelationType::Dependency | RelationType::Prerequisite | RelationType::Sequence => {
                state == NodeState::Completed
            }
            RelationType::Trigger | RelationType::Mutual => {
                matches!(state, NodeState::Active | NodeState::Completed)
            }
            RelationType::Parent => true,
            RelationType::Emotional => false,
        }
    }

    /// Whether interactions travel along this relation.
    pub fn propagates_interaction(self) -> bool {
        matches!(self, RelationType::Parent | RelationType::Mutual)
    }

    /// Direction override applied when a connection of this type is created.
    pub fn forced_bidirectional(self) -> Option<bool> {
        match self {
            RelationType::Parent | RelationType::Mutual => Some(true),
            RelationType::Sequence => Some(false),
            _ => None,
        }
    }

    /// Relations whose completion can unlock a locked target.
    pub fn is_gating(self) -> bool {
        matches!(self, RelationType::Dependency | RelationType::Prerequisite)
    }

    /// Case-insensitive parse; anything unrecognized becomes `Dependency`.
    ///
    /// `emotional` is deliberately not recognized by the descriptor format.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dependency" => RelationType::Dependency,
            "prerequisite" => RelationType::Prerequisite,
            "trigger" => RelationType::Trigger,
            "mutual" => RelationType::Mutual,
            "parent" => RelationType::Parent,
            "sequence" => RelationType::Sequence,
            _ => RelationType::Dependency,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RelationType::Dependency => "Dependency",
            RelationType::Prerequisite => "Prerequisite",
            RelationType::Trigger => "Trigger",
            RelationType::Mutual => "Mutual",
            RelationType::Parent => "Parent",
            RelationType::Sequence => "Sequence",
            RelationType::Emotional => "Emotional",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
