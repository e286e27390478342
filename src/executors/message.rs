use async_trait::async_trait;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::message::Message;
use crate::state::{NodeOutput, RunState, StatePatch};

/// Template used when a message node carries no template of its own.
pub const DEFAULT_TEMPLATE: &str = "기본 메시지: {input}";

/// Placeholder token substituted with the most recent message content.
const PLACEHOLDER: &str = "{input}";

/// Fixed apology appended when rendering fails. Rendering never aborts the
/// run.
pub const RENDER_FAILURE_MESSAGE: &str = "죄송합니다. 메시지 생성 중 오류가 발생했습니다.";

/// Renders a template against the latest message content and appends the
/// result as a new user turn.
#[derive(Debug)]
pub struct MessageExecutor {
    template: String,
}

impl MessageExecutor {
    #[must_use]
    pub fn new(template: Option<String>) -> Self {
        Self {
            template: template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
        }
    }

    /// Substitute the placeholder. A lone `{` opening an unterminated token
    /// is a malformed template and fails the render.
    fn render(&self, input: &str) -> Result<String, String> {
        if let Some(pos) = self.template.find('{') {
            let rest = &self.template[pos..];
            if !rest.starts_with(PLACEHOLDER) && !rest.contains('}') {
                return Err(format!("unterminated placeholder at byte {pos}"));
            }
        }
        Ok(self.template.replace(PLACEHOLDER, input))
    }
}

#[async_trait]
impl NodeExecutor for MessageExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        let input = state.latest_content().to_string();
        match self.render(&input) {
            Ok(rendered) => {
                tracing::debug!(node_id = %ctx.node_id, %rendered, "message node rendered");
                let patch = StatePatch::output_only(
                    &ctx.node_id,
                    NodeOutput::now(
                        "message",
                        json!({
                            "template": &self.template,
                            "rendered": &rendered,
                            "input": &input,
                        }),
                    ),
                )
                .with_message(Message::user(&rendered));
                Ok(StatePatch {
                    current_node_id: Some(ctx.node_id.clone()),
                    ..patch
                })
            }
            Err(reason) => {
                tracing::warn!(node_id = %ctx.node_id, %reason, "message render failed");
                let patch = StatePatch::output_only(
                    &ctx.node_id,
                    NodeOutput::error("message", &reason),
                )
                .with_message(Message::user(RENDER_FAILURE_MESSAGE));
                Ok(StatePatch {
                    current_node_id: Some(ctx.node_id.clone()),
                    ..patch
                })
            }
        }
    }
}
