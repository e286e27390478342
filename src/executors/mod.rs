//! Node executors: one state-transition function per node type.
//!
//! Executors are pure with respect to [`RunState`]: they read an immutable
//! snapshot and return a [`StatePatch`]. Recoverable failures (search,
//! template rendering) are folded into the node's output record by the
//! executor itself; an `Err` return is reserved for failures that should
//! abort the run.

use async_trait::async_trait;
use thiserror::Error;

use crate::events::{EventEmitter, FlowEvent};
use crate::state::{RunState, StatePatch};
use crate::types::NodeId;

mod branch;
mod chat;
mod input;
mod merge;
mod message;
mod output;
mod search;

pub use branch::BranchExecutor;
pub use chat::{ChatExecutor, SYSTEM_INSTRUCTION};
pub use input::InputExecutor;
pub use merge::MergeExecutor;
pub use message::{DEFAULT_TEMPLATE, MessageExecutor, RENDER_FAILURE_MESSAGE};
pub use output::OutputExecutor;
pub use search::SearchExecutor;

/// Failure raised out of an executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The run continues; the runner records the message under the node's
    /// output key.
    #[error("node {node_id} failed: {message}")]
    Recoverable { node_id: NodeId, message: String },

    /// The run aborts with `flow_error`. Accumulated node outputs are kept.
    #[error("node {node_id} failed fatally: {message}")]
    Fatal { node_id: NodeId, message: String },
}

impl ExecutorError {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutorError::Fatal { .. })
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            ExecutorError::Recoverable { node_id, .. } | ExecutorError::Fatal { node_id, .. } => {
                node_id
            }
        }
    }
}

/// Per-invocation context handed to an executor.
///
/// Carries the node's identity, its adjacency as grouped by the compiler
/// (outgoing targets for branch, incoming sources for merge), and the event
/// emitter for `node_streaming` chunks.
pub struct ExecContext {
    pub node_id: NodeId,
    pub outgoing: Vec<NodeId>,
    pub incoming: Vec<NodeId>,
    emitter: EventEmitter,
}

impl ExecContext {
    #[must_use]
    pub fn new(
        node_id: NodeId,
        outgoing: Vec<NodeId>,
        incoming: Vec<NodeId>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            node_id,
            outgoing,
            incoming,
            emitter,
        }
    }

    /// Emit a `node_streaming` chunk attributed to this node. Chunks always
    /// precede the node's `node_complete`.
    pub fn emit_chunk(&self, chunk: &str) {
        self.emitter
            .emit(FlowEvent::node_streaming(&self.node_id, chunk));
    }
}

/// The per-node state-transition contract.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError>;
}
