use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::state::{NodeOutput, RunState, StatePatch};

/// Fan-in point: aggregates the recorded outputs of every predecessor into a
/// single labeled content string.
///
/// By the time this runs, the scheduler has already merged all predecessor
/// patches, so every incoming node either has an entry in `node_outputs` or
/// produced none at all.
#[derive(Debug, Default)]
pub struct MergeExecutor;

/// Best-effort text form of one predecessor's output payload.
fn content_of(output: &NodeOutput) -> String {
    for key in ["rendered", "content", "prompt", "error"] {
        if let Some(Value::String(text)) = output.data.get(key) {
            return text.clone();
        }
    }
    output.data.to_string()
}

#[async_trait]
impl NodeExecutor for MergeExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        let mut parts = Vec::with_capacity(ctx.incoming.len());
        for source in &ctx.incoming {
            let label = match state.node_outputs.get(source) {
                Some(output) => format!("[{source}] {}", content_of(output)),
                None => format!("[{source}] (출력 없음)"),
            };
            parts.push(label);
        }
        let merged = parts.join("\n");
        tracing::debug!(node_id = %ctx.node_id, sources = ctx.incoming.len(), "merge node aggregated");

        let patch = StatePatch::output_only(
            &ctx.node_id,
            NodeOutput::now(
                "merge",
                json!({
                    "mergedContent": merged,
                    "inputNodeIds": &ctx.incoming,
                    "sourceNodeCount": ctx.incoming.len(),
                }),
            ),
        );
        Ok(StatePatch {
            current_node_id: Some(ctx.node_id.clone()),
            ..patch
        })
    }
}
