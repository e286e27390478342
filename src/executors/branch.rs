use async_trait::async_trait;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::state::{NodeOutput, RunState, StatePatch};

/// Fan-out marker. The runner's dependency levels realize the actual
/// fan-out; this executor only records where the flow splits.
#[derive(Debug, Default)]
pub struct BranchExecutor;

#[async_trait]
impl NodeExecutor for BranchExecutor {
    async fn run(&self, _state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        if ctx.outgoing.is_empty() {
            // Deliberate no-op, not an error.
            tracing::debug!(node_id = %ctx.node_id, "branch node has no targets, skipping");
            return Ok(StatePatch::output_only(
                &ctx.node_id,
                NodeOutput::now("branch", json!({ "skipped": true, "reason": "no targets" })),
            ));
        }
        let patch = StatePatch::output_only(
            &ctx.node_id,
            NodeOutput::now("branch", json!({ "targetNodes": &ctx.outgoing })),
        );
        Ok(StatePatch {
            current_node_id: Some(ctx.node_id.clone()),
            ..patch
        })
    }
}
