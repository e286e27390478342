//! Flowrun is a directed-graph flow execution engine: workflow definitions
//! made of typed nodes and edges are validated, compiled into a level-ordered
//! plan, and executed with streaming events, per-node state patches, and
//! checkpointed, rate-limited sessions.
//!
//! The pipeline is: [`model::FlowGraph`] → [`graph::validate`] →
//! [`graph::FlowCompiler`] → [`engine::FlowRunner`]. Node behavior lives in
//! [`executors`]; external text generation and search are consumed through
//! the traits in [`capabilities`]; transports drain each run's own event
//! channel, typically through the SSE adapter in [`streaming`].
//!
//! ```
//! use flowrun::graph::validate;
//! use flowrun::model::{Edge, FlowGraph, Node, NodeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = FlowGraph::new();
//! graph.add_node(Node::new("in", NodeConfig::Input))?;
//! graph.add_node(Node::new(
//!     "greet",
//!     NodeConfig::Message { template: Some("확인: {input}".into()) },
//! ))?;
//! graph.add_node(Node::new("out", NodeConfig::Output))?;
//! graph.add_edge(Edge::new("e1", "in", "greet"))?;
//! graph.add_edge(Edge::new("e2", "greet", "out"))?;
//!
//! assert!(validate(&graph).is_ok());
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod engine;
pub mod events;
pub mod executors;
pub mod graph;
pub mod message;
pub mod model;
pub mod state;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use engine::{EngineConfig, FlowRunner, InMemorySessionStore, RunHandle, SessionStore};
pub use events::{FlowEvent, FlowEventKind};
pub use graph::{FlowCompiler, validate};
pub use model::{Edge, FlowGraph, Node, NodeConfig};
pub use state::{NodeOutput, RunState, StatePatch};
