//! Error types for graph operations.

use node_rules::{ConnectionId, NodeId};
use thiserror::Error;

/// Reasons a graph operation was rejected.
///
/// None of these are fatal; the manager logs them and carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("node `{0}` is already registered")]
    DuplicateNode(NodeId),

    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),

    #[error("connection `{0}` not found")]
    ConnectionNotFound(ConnectionId),

    #[error("connection `{0}` already exists")]
    DuplicateConnection(ConnectionId),

    #[error("cannot connect node `{0}` to itself")]
    SelfLoop(NodeId),

    #[error("node spec `{0}` has no node class")]
    MissingClass(NodeId),

    #[error("node `{node}` already has the maximum of {limit} connections")]
    ConnectionLimit { node: NodeId, limit: usize },

    #[error("node `{0}` is not a scene")]
    NotAScene(NodeId),

    #[error("delay of {0} seconds cannot be scheduled")]
    InvalidDelay(f32),
}

pub type GraphResult<T> = Result<T, GraphError>;
