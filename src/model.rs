//! Graph model: nodes, edges, and the [`FlowGraph`] container.
//!
//! A [`FlowGraph`] is the at-rest workflow definition produced by an external
//! authoring surface. It is immutable during a run; the only enforcement that
//! happens while it is being assembled is the per-handle connection ceiling,
//! which [`FlowGraph::add_edge`] applies at edge-creation time. Structural
//! invariants (singleton input/output, acyclicity, reachability) are checked
//! separately by [`crate::graph::validate`] before a run is admitted.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{HandleSide, NodeId, NodeType, max_connections};

/// Node-type-specific configuration payload.
///
/// This is the closed sum over the enumerated node types; the compiler
/// matches it exhaustively, so adding a variant is a compile error everywhere
/// dispatch happens rather than a silent fall-through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Input,
    Output,
    Message {
        /// Template with a `{input}` placeholder. Falls back to the default
        /// template when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    Search,
    Chat {
        /// Model identifier forwarded to the text-generation capability.
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Size of the trailing message window handed to the model.
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<usize>,
    },
    Branch,
    Merge,
    Custom {
        kind: String,
    },
}

impl NodeConfig {
    /// The type tag for this configuration.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Input => NodeType::Input,
            NodeConfig::Output => NodeType::Output,
            NodeConfig::Message { .. } => NodeType::Message,
            NodeConfig::Search => NodeType::Search,
            NodeConfig::Chat { .. } => NodeType::Chat,
            NodeConfig::Branch => NodeType::Branch,
            NodeConfig::Merge => NodeType::Merge,
            NodeConfig::Custom { kind } => NodeType::Custom(kind.clone()),
        }
    }
}

/// A node in the workflow definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}

/// A directed edge between two nodes, optionally pinned to named handles.
///
/// Handles exist so multi-input/multi-output node types can distinguish their
/// connection points; an absent handle is the node's default handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    #[must_use]
    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    #[must_use]
    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// Errors raised while assembling a [`FlowGraph`].
#[derive(Debug, Error)]
pub enum GraphModelError {
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("duplicate edge id: {0}")]
    DuplicateEdgeId(String),

    #[error("edge {edge_id} references unknown node: {node_id}")]
    UnknownNode { edge_id: String, node_id: NodeId },

    #[error(
        "handle {handle} on {node_id} ({node_type}) is full: at most {limit} connections allowed"
    )]
    HandleFull {
        node_id: NodeId,
        node_type: NodeType,
        handle: String,
        limit: usize,
    },
}

/// The workflow definition: a set of typed nodes plus directed edges.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl FlowGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Add a node. Node ids must be unique within the graph.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphModelError> {
        if self.node(&node.id).is_some() {
            return Err(GraphModelError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add an edge, enforcing the per-handle connection ceiling for both
    /// endpoints. This is the only run-up check the model performs itself;
    /// it happens here rather than at run time so an inadmissible fan-out or
    /// fan-in is rejected the moment the author draws it.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphModelError> {
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(GraphModelError::DuplicateEdgeId(edge.id));
        }
        let source = self
            .node(&edge.source)
            .ok_or_else(|| GraphModelError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            })?
            .clone();
        let target = self
            .node(&edge.target)
            .ok_or_else(|| GraphModelError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            })?
            .clone();

        self.check_handle_capacity(&source, HandleSide::Source, edge.source_handle.as_deref())?;
        self.check_handle_capacity(&target, HandleSide::Target, edge.target_handle.as_deref())?;

        self.edges.push(edge);
        Ok(())
    }

    fn check_handle_capacity(
        &self,
        node: &Node,
        side: HandleSide,
        handle: Option<&str>,
    ) -> Result<(), GraphModelError> {
        let node_type = node.config.node_type();
        let Some(limit) = max_connections(&node_type, side) else {
            return Ok(());
        };
        let occupied = self
            .edges
            .iter()
            .filter(|e| match side {
                HandleSide::Source => {
                    e.source == node.id && e.source_handle.as_deref() == handle
                }
                HandleSide::Target => {
                    e.target == node.id && e.target_handle.as_deref() == handle
                }
            })
            .count();
        if occupied >= limit {
            return Err(GraphModelError::HandleFull {
                node_id: node.id.clone(),
                node_type,
                handle: handle.unwrap_or("default").to_string(),
                limit,
            });
        }
        Ok(())
    }

    /// Outgoing neighbor ids grouped by source, in edge insertion order.
    #[must_use]
    pub fn outgoing(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut map: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for edge in &self.edges {
            map.entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        map
    }

    /// Incoming neighbor ids grouped by target, in edge insertion order.
    #[must_use]
    pub fn incoming(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut map: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for edge in &self.edges {
            map.entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
        }
        map
    }
}
