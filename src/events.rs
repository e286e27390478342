//! Flow events and the channel/sink plumbing that carries them.
//!
//! The runner is the single producer for a run: it writes [`FlowEvent`]s to a
//! [`flume`] channel through an [`EventEmitter`], and transports or tests
//! drain the matching receiver. Sinks are the pull-side adapters; the runner
//! never knows which transport (SSE, memory capture, another channel) is
//! listening.
//!
//! Event ordering is the run's linear history: `flow_start` first, then
//! per-node `node_start`/`node_streaming`.../`node_complete` (or
//! `node_error`), closed by exactly one terminal event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{NodeId, NodeType};

/// Discriminant for [`FlowEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventKind {
    FlowStart,
    NodeStart,
    NodeComplete,
    NodeStreaming,
    NodeError,
    FlowComplete,
    FlowError,
}

impl FlowEventKind {
    /// Wire name of the event kind, used as the SSE event field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowEventKind::FlowStart => "flow_start",
            FlowEventKind::NodeStart => "node_start",
            FlowEventKind::NodeComplete => "node_complete",
            FlowEventKind::NodeStreaming => "node_streaming",
            FlowEventKind::NodeError => "node_error",
            FlowEventKind::FlowComplete => "flow_complete",
            FlowEventKind::FlowError => "flow_error",
        }
    }

    /// Terminal events close the stream; a run emits exactly one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowEventKind::FlowComplete | FlowEventKind::FlowError)
    }
}

/// One entry in a run's event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    #[serde(rename = "event")]
    pub kind: FlowEventKind,
    #[serde(rename = "nodeId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(rename = "nodeType", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl FlowEvent {
    fn new(kind: FlowEventKind) -> Self {
        Self {
            kind,
            node_id: None,
            node_type: None,
            message: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// First event of every run, carrying the session id.
    #[must_use]
    pub fn flow_start(session_id: &str) -> Self {
        let mut ev = Self::new(FlowEventKind::FlowStart);
        ev.data = Some(json!({ "sessionId": session_id }));
        ev
    }

    #[must_use]
    pub fn node_start(node_id: &str, node_type: NodeType) -> Self {
        let mut ev = Self::new(FlowEventKind::NodeStart);
        ev.node_id = Some(node_id.to_string());
        ev.node_type = Some(node_type);
        ev
    }

    #[must_use]
    pub fn node_complete(node_id: &str, node_type: NodeType, data: Option<Value>) -> Self {
        let mut ev = Self::new(FlowEventKind::NodeComplete);
        ev.node_id = Some(node_id.to_string());
        ev.node_type = Some(node_type);
        ev.data = data;
        ev
    }

    /// Incremental chunk produced while a node is still running.
    #[must_use]
    pub fn node_streaming(node_id: &str, chunk: &str) -> Self {
        let mut ev = Self::new(FlowEventKind::NodeStreaming);
        ev.node_id = Some(node_id.to_string());
        ev.data = Some(json!({ "chunk": chunk }));
        ev
    }

    #[must_use]
    pub fn node_error(node_id: &str, node_type: NodeType, message: &str) -> Self {
        let mut ev = Self::new(FlowEventKind::NodeError);
        ev.node_id = Some(node_id.to_string());
        ev.node_type = Some(node_type);
        ev.message = Some(message.to_string());
        ev
    }

    #[must_use]
    pub fn flow_complete(final_result: Option<Value>) -> Self {
        let mut ev = Self::new(FlowEventKind::FlowComplete);
        ev.data = final_result;
        ev
    }

    #[must_use]
    pub fn flow_error(message: &str) -> Self {
        let mut ev = Self::new(FlowEventKind::FlowError);
        ev.message = Some(message.to_string());
        ev
    }
}

/// Producer handle cloned into the runner and node contexts.
///
/// Emission never blocks and never fails the run: once every receiver is
/// gone, events are dropped with a debug log.
#[derive(Clone)]
pub struct EventEmitter {
    sender: flume::Sender<FlowEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: FlowEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::debug!(event = %err.into_inner().kind.as_str(), "event dropped, no receivers");
        }
    }
}

/// Unbounded channel pairing one run's producer with its consumers.
pub struct EventBus {
    sender: flume::Sender<FlowEvent>,
    receiver: flume::Receiver<FlowEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            sender: self.sender.clone(),
        }
    }

    /// Consumer side. Cloneable; each clone competes for events, so give one
    /// receiver per transport.
    #[must_use]
    pub fn receiver(&self) -> flume::Receiver<FlowEvent> {
        self.receiver.clone()
    }
}

/// Destination for drained events.
pub trait EventSink: Send + Sync {
    fn accept(&self, event: FlowEvent);
}

/// Forwards events into another flume channel, bridging runs to a transport
/// that owns its own queue.
pub struct ChannelSink {
    sender: flume::Sender<FlowEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: flume::Sender<FlowEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn accept(&self, event: FlowEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("channel sink closed, event dropped");
        }
    }
}

/// Captures events in memory. Intended for tests and diagnostics.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<FlowEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything accepted so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FlowEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn accept(&self, event: FlowEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Drain a receiver into a sink until the channel closes or a terminal event
/// arrives.
pub fn drain_into(receiver: &flume::Receiver<FlowEvent>, sink: &dyn EventSink) {
    while let Ok(event) = receiver.recv() {
        let terminal = event.kind.is_terminal();
        sink.accept(event);
        if terminal {
            break;
        }
    }
}
