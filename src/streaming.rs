//! Server-sent-event encoding of the flow event stream.
//!
//! This is the boundary contract for push transports: each [`FlowEvent`]
//! becomes one SSE frame, and the adapted stream ends right after the run's
//! terminal event so the transport can close the response cleanly.

use futures_util::{Stream, StreamExt, stream};

use crate::events::FlowEvent;

/// Encode one event as an SSE frame: `event: <kind>\ndata: <json>\n\n`.
pub fn sse_frame(event: &FlowEvent) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(event)?;
    Ok(format!("event: {}\ndata: {payload}\n\n", event.kind.as_str()))
}

/// Adapt a run's event receiver into an async stream of SSE frames.
///
/// The stream yields the terminal event's frame and then ends immediately,
/// even if the channel stays open and quiet; the done state is checked
/// before awaiting another event, so a drained run never leaves the
/// transport pending. Events that fail to serialize are skipped; the event
/// type is fully serde-derived, so that path is not expected to occur.
pub fn sse_stream(receiver: flume::Receiver<FlowEvent>) -> impl Stream<Item = String> {
    stream::unfold(Some(receiver.into_stream()), |state| async move {
        let mut events = state?;
        loop {
            let event = events.next().await?;
            let frame = sse_frame(&event).ok();
            if event.kind.is_terminal() {
                return frame.map(|frame| (frame, None));
            }
            if let Some(frame) = frame {
                return Some((frame, Some(events)));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::types::NodeType;

    #[test]
    fn frame_carries_kind_and_json_payload() {
        let frame = sse_frame(&FlowEvent::node_start("a", NodeType::Chat)).unwrap();
        assert!(frame.starts_with("event: node_start\ndata: "));
        assert!(frame.ends_with("\n\n"));

        let payload = frame
            .strip_prefix("event: node_start\ndata: ")
            .unwrap()
            .trim_end();
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["event"], "node_start");
        assert_eq!(value["nodeId"], "a");
        assert_eq!(value["nodeType"], "chat");
    }

    #[tokio::test]
    async fn stream_ends_after_terminal_event() {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        emitter.emit(FlowEvent::flow_start("s"));
        emitter.emit(FlowEvent::node_start("a", NodeType::Input));
        emitter.emit(FlowEvent::flow_complete(None));
        // Anything after the terminal event must not be yielded.
        emitter.emit(FlowEvent::node_start("ghost", NodeType::Chat));

        let frames: Vec<String> = sse_stream(bus.receiver()).collect().await;
        assert_eq!(frames.len(), 3);
        assert!(frames[0].starts_with("event: flow_start\n"));
        assert!(frames[2].starts_with("event: flow_complete\n"));
    }

    #[tokio::test]
    async fn stream_closes_with_the_channel_still_open_and_quiet() {
        let bus = EventBus::new();
        let emitter = bus.emitter();
        emitter.emit(FlowEvent::flow_start("s"));
        emitter.emit(FlowEvent::flow_complete(None));

        // Nothing follows the terminal event and the sender stays alive; the
        // stream must still end after the terminal frame.
        let frames: Vec<String> = sse_stream(bus.receiver()).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[1].starts_with("event: flow_complete\n"));
        drop(emitter);
    }

    #[tokio::test]
    async fn error_run_ends_with_flow_error() {
        let bus = EventBus::new();
        let receiver = bus.receiver();
        let emitter = bus.emitter();
        emitter.emit(FlowEvent::flow_start("s"));
        emitter.emit(FlowEvent::node_error("c", NodeType::Chat, "boom"));
        emitter.emit(FlowEvent::flow_error("boom"));

        let frames: Vec<String> = sse_stream(receiver).collect().await;
        let last = frames.last().unwrap();
        assert!(last.starts_with("event: flow_error\n"));
        assert!(last.contains("boom"));
        assert_eq!(
            frames
                .iter()
                .filter(|f| f.starts_with("event: flow_error")
                    || f.starts_with("event: flow_complete"))
                .count(),
            1,
        );
    }
}
