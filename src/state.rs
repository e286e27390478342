//! Run state threaded through node execution, and the patch type executors
//! return.
//!
//! Executors never mutate [`RunState`] in place. Each one reads an immutable
//! snapshot and returns a [`StatePatch`]; the runner merges patches in a
//! stable order so concurrent nodes within a level stay deterministic.
//! Merge semantics: `messages` and `search_results` append, `node_outputs`
//! unions with per-id overwrite, everything else replaces when set.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::capabilities::SearchResult;
use crate::message::Message;
use crate::types::NodeId;

/// One node's recorded output within a run.
///
/// The payload is node-type specific (rendered text, error, skipped flag,
/// target list) and rides flattened next to the tag and timestamp, so the
/// persisted form reads as a single flat object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Value,
}

impl NodeOutput {
    /// Record an output stamped with the current time. `data` must be a JSON
    /// object so it can flatten cleanly.
    #[must_use]
    pub fn now(kind: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Record a recoverable failure under the node's output key.
    #[must_use]
    pub fn error(kind: &str, message: &str) -> Self {
        Self::now(kind, json!({ "error": message }))
    }
}

/// The mutable state owned by exactly one in-flight run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunState {
    pub messages: Vec<Message>,
    pub prompt: String,
    pub current_node_id: NodeId,
    pub search_results: Vec<SearchResult>,
    pub final_result: Option<Value>,
    pub node_outputs: FxHashMap<NodeId, NodeOutput>,
}

impl RunState {
    /// Fresh state seeded with the run prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Content of the most recent message, falling back to the prompt, then
    /// to the empty string.
    #[must_use]
    pub fn latest_content(&self) -> &str {
        match self.messages.last() {
            Some(msg) => &msg.content,
            None => &self.prompt,
        }
    }

    /// Merge one executor's patch into the authoritative state.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(messages) = patch.messages {
            self.messages.extend(messages);
        }
        if let Some(results) = patch.search_results {
            self.search_results.extend(results);
        }
        if let Some(outputs) = patch.node_outputs {
            for (id, output) in outputs {
                self.node_outputs.insert(id, output);
            }
        }
        if let Some(prompt) = patch.prompt {
            self.prompt = prompt;
        }
        if let Some(id) = patch.current_node_id {
            self.current_node_id = id;
        }
        if let Some(result) = patch.final_result {
            self.final_result = Some(result);
        }
    }
}

/// Partial state update returned by a node executor.
///
/// All fields are optional; `None` means "no change" for that part of the
/// state. Patches compose: applying several in order is equivalent to
/// applying their concatenation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_outputs: Option<FxHashMap<NodeId, NodeOutput>>,
}

impl StatePatch {
    /// Patch that only records an output under `node_id`.
    #[must_use]
    pub fn output_only(node_id: &str, output: NodeOutput) -> Self {
        Self {
            node_outputs: Some(crate::utils::new_output_map(node_id, output)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.get_or_insert_with(Vec::new).push(message);
        self
    }

    /// True when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.prompt.is_none()
            && self.current_node_id.is_none()
            && self.search_results.is_none()
            && self.final_result.is_none()
            && self.node_outputs.is_none()
    }
}
