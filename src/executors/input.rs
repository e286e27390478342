use async_trait::async_trait;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::message::Message;
use crate::state::{NodeOutput, RunState, StatePatch};

/// Entry node: seeds the conversation with the run prompt.
#[derive(Debug, Default)]
pub struct InputExecutor;

#[async_trait]
impl NodeExecutor for InputExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        tracing::debug!(node_id = %ctx.node_id, "input node seeding prompt");
        let patch = StatePatch::output_only(
            &ctx.node_id,
            NodeOutput::now("input", json!({ "prompt": &state.prompt })),
        )
        .with_message(Message::user(&state.prompt));
        Ok(StatePatch {
            current_node_id: Some(ctx.node_id.clone()),
            ..patch
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    fn ctx(node_id: &str) -> ExecContext {
        ExecContext::new(node_id.into(), vec![], vec![], EventBus::new().emitter())
    }

    #[tokio::test]
    async fn appends_user_message_and_records_prompt() {
        let state = RunState::new("안녕");
        let patch = InputExecutor.run(&state, &ctx("in")).await.unwrap();

        assert_eq!(patch.messages, Some(vec![Message::user("안녕")]));
        let outputs = patch.node_outputs.unwrap();
        assert_eq!(outputs["in"].kind, "input");
        assert_eq!(outputs["in"].data["prompt"], "안녕");
        assert_eq!(patch.current_node_id.as_deref(), Some("in"));
    }
}
