//! Core identifiers and node-type tags for flow graphs.
//!
//! A [`NodeType`] is the closed set of node kinds a flow graph may contain.
//! The per-handle connection ceilings that the graph model enforces at
//! edge-creation time also live here, since they are keyed by node type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique node identifier within one flow graph.
pub type NodeId = String;

/// Session identifier handed out on `flow_start` and used to key checkpoints.
pub type SessionId = String;

/// The closed set of node kinds understood by the compiler.
///
/// Every variant maps to exactly one executor; `Custom` kinds must be
/// registered with the compiler explicitly, so an unknown tag can never fall
/// through dispatch silently.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Input,
    Output,
    Message,
    Search,
    Chat,
    Branch,
    Merge,
    Custom(String),
}

impl NodeType {
    /// Encode into the persisted string form (`"custom:<kind>"` for customs).
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeType::Input => "input".to_string(),
            NodeType::Output => "output".to_string(),
            NodeType::Message => "message".to_string(),
            NodeType::Search => "search".to_string(),
            NodeType::Chat => "chat".to_string(),
            NodeType::Branch => "branch".to_string(),
            NodeType::Merge => "merge".to_string(),
            NodeType::Custom(kind) => format!("custom:{kind}"),
        }
    }

    /// Decode the persisted string form. Unrecognized tags become `Custom`,
    /// keeping the decoding forward-compatible.
    pub fn decode(s: &str) -> Self {
        match s {
            "input" => NodeType::Input,
            "output" => NodeType::Output,
            "message" => NodeType::Message,
            "search" => NodeType::Search,
            "chat" => NodeType::Chat,
            "branch" => NodeType::Branch,
            "merge" => NodeType::Merge,
            other => match other.strip_prefix("custom:") {
                Some(kind) => NodeType::Custom(kind.to_string()),
                None => NodeType::Custom(other.to_string()),
            },
        }
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input)
    }

    #[must_use]
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Which side of an edge a handle sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleSide {
    /// Outgoing handle on the edge's source node.
    Source,
    /// Incoming handle on the edge's target node.
    Target,
}

/// Maximum connections allowed per handle for a node type, or `None` when the
/// handle is unbounded.
///
/// Branch nodes fan out to at most 3 targets per source handle; merge nodes
/// accept at most 4 inputs per target handle. Everything else is unbounded.
/// This table is consulted when an edge is added, never at run time.
#[must_use]
pub fn max_connections(node_type: &NodeType, side: HandleSide) -> Option<usize> {
    match (node_type, side) {
        (NodeType::Branch, HandleSide::Source) => Some(3),
        (NodeType::Merge, HandleSide::Target) => Some(4),
        _ => None,
    }
}
