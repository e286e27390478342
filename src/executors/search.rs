use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::capabilities::SearchProvider;
use crate::state::{NodeOutput, RunState, StatePatch};

/// Queries the external search capability with the current prompt.
///
/// Search failures are recorded as error outputs, never propagated, so
/// downstream nodes still run on a degraded state.
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
}

impl SearchExecutor {
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl NodeExecutor for SearchExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        match self.provider.search(&state.prompt).await {
            Ok(results) => {
                tracing::debug!(node_id = %ctx.node_id, count = results.len(), "search completed");
                let output = NodeOutput::now(
                    "search",
                    json!({
                        "query": &state.prompt,
                        "results": &results,
                        "resultCount": results.len(),
                    }),
                );
                Ok(StatePatch {
                    search_results: Some(results),
                    current_node_id: Some(ctx.node_id.clone()),
                    ..StatePatch::output_only(&ctx.node_id, output)
                })
            }
            Err(err) => {
                tracing::warn!(node_id = %ctx.node_id, error = %err, "search failed, recording error output");
                Ok(StatePatch {
                    current_node_id: Some(ctx.node_id.clone()),
                    ..StatePatch::output_only(
                        &ctx.node_id,
                        NodeOutput::error("search", &err.to_string()),
                    )
                })
            }
        }
    }
}
