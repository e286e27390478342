//! Compilation of a validated [`FlowGraph`] into an inert, runnable plan.
//!
//! The compiler binds one executor per node by matching its config
//! exhaustively, groups edges into per-node adjacency (outgoing targets for
//! branch fan-out, incoming sources for merge fan-in), and computes Kahn
//! topological levels. Nodes within a level have no edges among themselves,
//! so the runner may dispatch a whole level concurrently; every predecessor
//! of a node sits in a strictly earlier level, which is what lets a merge
//! node assume all its inputs have already been folded into the state.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::capabilities::{SearchProvider, TextGenerator};
use crate::engine::config::EngineConfig;
use crate::executors::{
    BranchExecutor, ChatExecutor, InputExecutor, MergeExecutor, MessageExecutor, NodeExecutor,
    OutputExecutor, SearchExecutor,
};
use crate::graph::validation::{ValidationError, validate};
use crate::model::{FlowGraph, NodeConfig};
use crate::types::{NodeId, NodeType};

/// Why compilation failed.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Defensive re-validation caught an inadmissible graph.
    #[error("graph failed validation: {0}")]
    Invalid(#[from] ValidationError),

    /// A `custom` node names a kind nobody registered an executor for.
    #[error("no executor registered for custom node kind {0:?}")]
    UnregisteredCustomKind(String),

    /// Level computation did not consume every node. Unreachable after
    /// validation; kept so a validator regression cannot hang the runner.
    #[error("topological ordering left {0} nodes unplaced")]
    UnorderedNodes(usize),
}

/// One node of the compiled plan.
pub struct PlannedNode {
    pub executor: Arc<dyn NodeExecutor>,
    pub node_type: NodeType,
    pub outgoing: Vec<NodeId>,
    pub incoming: Vec<NodeId>,
}

/// The runnable plan: adjacency plus level ordering. Inert until handed to a
/// runner.
pub struct ExecutablePlan {
    pub input_id: NodeId,
    pub output_id: NodeId,
    /// Topological levels in execution order; nodes within a level are
    /// mutually independent.
    pub levels: Vec<Vec<NodeId>>,
    pub nodes: FxHashMap<NodeId, PlannedNode>,
}

/// Binds capability handles and settings, then turns graphs into plans.
pub struct FlowCompiler {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    config: EngineConfig,
    custom: FxHashMap<String, Arc<dyn NodeExecutor>>,
}

impl FlowCompiler {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator,
            search,
            config,
            custom: FxHashMap::default(),
        }
    }

    /// Register an executor for a `custom` node kind. Unregistered kinds are
    /// a [`CompileError`], never a silent fall-through.
    #[must_use]
    pub fn with_custom_executor(
        mut self,
        kind: impl Into<String>,
        executor: Arc<dyn NodeExecutor>,
    ) -> Self {
        self.custom.insert(kind.into(), executor);
        self
    }

    /// Compile a graph into an [`ExecutablePlan`]. Re-runs validation so a
    /// caller that skipped it still cannot run an inadmissible graph.
    pub fn compile(&self, graph: &FlowGraph) -> Result<ExecutablePlan, CompileError> {
        validate(graph)?;

        let outgoing = graph.outgoing();
        let incoming = graph.incoming();

        let mut nodes: FxHashMap<NodeId, PlannedNode> = FxHashMap::default();
        let mut input_id = NodeId::new();
        let mut output_id = NodeId::new();
        for node in graph.nodes() {
            let node_type = node.config.node_type();
            if node_type.is_input() {
                input_id = node.id.clone();
            }
            if node_type.is_output() {
                output_id = node.id.clone();
            }
            nodes.insert(
                node.id.clone(),
                PlannedNode {
                    executor: self.bind(&node.config)?,
                    node_type,
                    outgoing: outgoing.get(&node.id).cloned().unwrap_or_default(),
                    incoming: incoming.get(&node.id).cloned().unwrap_or_default(),
                },
            );
        }

        let levels = kahn_levels(graph)?;

        tracing::debug!(
            nodes = nodes.len(),
            levels = levels.len(),
            "graph compiled"
        );
        Ok(ExecutablePlan {
            input_id,
            output_id,
            levels,
            nodes,
        })
    }

    fn bind(&self, config: &NodeConfig) -> Result<Arc<dyn NodeExecutor>, CompileError> {
        let executor: Arc<dyn NodeExecutor> = match config {
            NodeConfig::Input => Arc::new(InputExecutor),
            NodeConfig::Output => Arc::new(OutputExecutor),
            NodeConfig::Message { template } => {
                Arc::new(MessageExecutor::new(template.clone()))
            }
            NodeConfig::Search => Arc::new(SearchExecutor::new(self.search.clone())),
            NodeConfig::Chat { model, window } => Arc::new(ChatExecutor::new(
                self.generator.clone(),
                model.clone(),
                window.unwrap_or(self.config.chat_window),
            )),
            NodeConfig::Branch => Arc::new(BranchExecutor),
            NodeConfig::Merge => Arc::new(MergeExecutor),
            NodeConfig::Custom { kind } => self
                .custom
                .get(kind)
                .cloned()
                .ok_or_else(|| CompileError::UnregisteredCustomKind(kind.clone()))?,
        };
        Ok(executor)
    }
}

/// Kahn's algorithm, grouped into levels. Node insertion order breaks ties,
/// so the level layout is deterministic for a given graph.
fn kahn_levels(graph: &FlowGraph) -> Result<Vec<Vec<NodeId>>, CompileError> {
    let outgoing = graph.outgoing();
    let mut indegree: FxHashMap<&str, usize> = graph
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();
    for edge in graph.edges() {
        if let Some(count) = indegree.get_mut(edge.target.as_str()) {
            *count += 1;
        }
    }

    let mut frontier: Vec<&str> = graph
        .nodes()
        .iter()
        .filter(|n| indegree[n.id.as_str()] == 0)
        .map(|n| n.id.as_str())
        .collect();

    let mut levels = Vec::new();
    let mut placed = 0usize;
    while !frontier.is_empty() {
        levels.push(frontier.iter().map(|id| id.to_string()).collect());
        placed += frontier.len();

        let mut next: Vec<&str> = Vec::new();
        for id in &frontier {
            if let Some(targets) = outgoing.get(*id) {
                for target in targets {
                    let count = indegree
                        .get_mut(target.as_str())
                        .ok_or(CompileError::UnorderedNodes(0))?;
                    *count -= 1;
                    if *count == 0 {
                        next.push(target.as_str());
                    }
                }
            }
        }
        // Keep node insertion order within the level, not discovery order.
        next.sort_by_key(|id| {
            graph
                .nodes()
                .iter()
                .position(|n| n.id == *id)
                .unwrap_or(usize::MAX)
        });
        next.dedup();
        frontier = next;
    }

    let remaining = graph.nodes().len() - placed;
    if remaining > 0 {
        return Err(CompileError::UnorderedNodes(remaining));
    }
    Ok(levels)
}
