use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ExecContext, ExecutorError, NodeExecutor};
use crate::capabilities::TextGenerator;
use crate::message::Message;
use crate::state::{NodeOutput, RunState, StatePatch};

/// System instruction prepended to every chat invocation.
pub const SYSTEM_INSTRUCTION: &str =
    "당신은 친절한 AI 어시스턴트입니다. 사용자의 질문에 정확하고 간결하게 답변하세요.";

/// Invokes the text-generation capability over a bounded message window.
///
/// Generation failures abort the run: downstream nodes depend on the reply,
/// so there is no degraded continuation here.
pub struct ChatExecutor {
    generator: Arc<dyn TextGenerator>,
    model: Option<String>,
    window: usize,
}

impl ChatExecutor {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, model: Option<String>, window: usize) -> Self {
        Self {
            generator,
            model,
            window,
        }
    }

    /// The last `window` messages with the system instruction prepended.
    fn context_window(&self, state: &RunState) -> Vec<Message> {
        let tail_start = state.messages.len().saturating_sub(self.window);
        let mut window = Vec::with_capacity(state.messages.len() - tail_start + 1);
        window.push(Message::system(SYSTEM_INSTRUCTION));
        window.extend_from_slice(&state.messages[tail_start..]);
        window
    }
}

#[async_trait]
impl NodeExecutor for ChatExecutor {
    async fn run(&self, state: &RunState, ctx: &ExecContext) -> Result<StatePatch, ExecutorError> {
        let window = self.context_window(state);
        tracing::debug!(
            node_id = %ctx.node_id,
            window = window.len(),
            model = self.model.as_deref().unwrap_or("default"),
            "chat node invoking generator"
        );
        let reply = self
            .generator
            .generate(&window)
            .await
            .map_err(|err| ExecutorError::Fatal {
                node_id: ctx.node_id.clone(),
                message: err.to_string(),
            })?;

        ctx.emit_chunk(&reply);

        let output = NodeOutput::now(
            "chat",
            json!({
                "content": &reply,
                "model": self.model.as_deref(),
                "messageCount": window.len(),
            }),
        );
        let patch = StatePatch::output_only(&ctx.node_id, output)
            .with_message(Message::assistant(&reply));
        Ok(StatePatch {
            current_node_id: Some(ctx.node_id.clone()),
            ..patch
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityError;
    use crate::events::{EventBus, FlowEventKind};

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, messages: &[Message]) -> Result<String, CapabilityError> {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            Ok(format!("응답: {last}"))
        }
    }

    struct CountingGenerator;

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, messages: &[Message]) -> Result<String, CapabilityError> {
            Ok(messages.len().to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _messages: &[Message]) -> Result<String, CapabilityError> {
            Err(CapabilityError::Call("provider unavailable".into()))
        }
    }

    fn ctx(node_id: &str, bus: &EventBus) -> ExecContext {
        ExecContext::new(node_id.into(), vec![], vec![], bus.emitter())
    }

    #[tokio::test]
    async fn appends_assistant_reply_and_streams_chunk() {
        let mut state = RunState::new("q");
        state.messages.push(Message::user("안녕"));
        let bus = EventBus::new();
        let exec = ChatExecutor::new(Arc::new(EchoGenerator), None, 10);
        let patch = exec.run(&state, &ctx("c", &bus)).await.unwrap();

        assert_eq!(patch.messages, Some(vec![Message::assistant("응답: 안녕")]));
        let outputs = patch.node_outputs.unwrap();
        assert_eq!(outputs["c"].data["content"], "응답: 안녕");

        let streamed = bus.receiver().try_recv().unwrap();
        assert_eq!(streamed.kind, FlowEventKind::NodeStreaming);
        assert_eq!(streamed.data.unwrap()["chunk"], "응답: 안녕");
    }

    #[tokio::test]
    async fn window_is_bounded_and_includes_system_instruction() {
        let mut state = RunState::new("q");
        for i in 0..20 {
            state.messages.push(Message::user(&i.to_string()));
        }
        let bus = EventBus::new();
        let exec = ChatExecutor::new(Arc::new(CountingGenerator), None, 10);
        let patch = exec.run(&state, &ctx("c", &bus)).await.unwrap();

        // 10 trailing messages plus the system turn.
        assert_eq!(
            patch.messages,
            Some(vec![Message::assistant("11")])
        );
    }

    #[tokio::test]
    async fn generator_failure_is_fatal() {
        let bus = EventBus::new();
        let exec = ChatExecutor::new(Arc::new(FailingGenerator), None, 10);
        let err = exec
            .run(&RunState::new("q"), &ctx("c", &bus))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.node_id(), "c");
    }
}
