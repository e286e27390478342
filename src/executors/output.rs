use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::state::{NodeOutput, RunState, StatePatch};

/// Terminal node: snapshots the run into `final_result`.
///
/// The snapshot is taken at call time, so it excludes this node's own output
/// entry but includes everything upstream produced.
#[derive(Debug, Default)]
pub struct OutputExecutor;

#[async_trait]
impl NodeExecutor for OutputExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        let snapshot = json!({
            "messages": &state.messages,
            "searchResults": &state.search_results,
            "nodeOutputs": &state.node_outputs,
            "timestamp": Utc::now(),
        });
        tracing::debug!(
            node_id = %ctx.node_id,
            messages = state.messages.len(),
            "output node snapshotting final result"
        );
        let patch = StatePatch::output_only(
            &ctx.node_id,
            NodeOutput::now("output", json!({ "finalResult": &snapshot })),
        );
        Ok(StatePatch {
            final_result: Some(snapshot),
            current_node_id: Some(ctx.node_id.clone()),
            ..patch
        })
    }
}
