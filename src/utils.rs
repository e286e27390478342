//! Small shared helpers: id minting and output-map construction.

use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::state::NodeOutput;
use crate::types::{NodeId, SessionId};

/// Mints session and run identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// Fresh session id, handed out on `flow_start`.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        format!("sess-{}", Uuid::new_v4())
    }

    /// Fresh run id for log correlation.
    #[must_use]
    pub fn run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }
}

/// Single-entry output map, the common shape of an executor patch.
#[must_use]
pub fn new_output_map(node_id: &str, output: NodeOutput) -> FxHashMap<NodeId, NodeOutput> {
    let mut map = FxHashMap::default();
    map.insert(node_id.to_string(), output);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let ids = IdGenerator;
        let a = ids.session_id();
        let b = ids.session_id();
        assert_ne!(a, b);
        assert!(a.starts_with("sess-"));
        assert!(ids.run_id().starts_with("run-"));
    }

    #[test]
    fn output_map_holds_one_entry() {
        let map = new_output_map("n", NodeOutput::now("input", json!({ "prompt": "p" })));
        assert_eq!(map.len(), 1);
        assert_eq!(map["n"].kind, "input");
    }
}
