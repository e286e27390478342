//! Shared fixtures: canned graphs, fake capabilities, and runner wiring.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;

use flowrun::capabilities::{CapabilityError, SearchProvider, SearchResult, TextGenerator};
use flowrun::engine::{EngineConfig, FlowRunner, InMemorySessionStore};
use flowrun::graph::FlowCompiler;
use flowrun::message::Message;
use flowrun::model::{Edge, FlowGraph, Node, NodeConfig};

/// Replies `"응답: <last message content>"`.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String, CapabilityError> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("응답: {last}"))
    }
}

/// Always fails, for exercising the fatal chat path.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _messages: &[Message]) -> Result<String, CapabilityError> {
        Err(CapabilityError::Call("provider unavailable".into()))
    }
}

/// Returns one fixed hit for any query.
pub struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError> {
        Ok(vec![SearchResult {
            title: format!("{query}에 대한 결과"),
            link: "https://example.com".into(),
            snippet: "발췌".into(),
        }])
    }
}

pub fn compiler() -> FlowCompiler {
    FlowCompiler::new(
        Arc::new(EchoGenerator),
        Arc::new(StubSearch),
        EngineConfig::default(),
    )
}

pub fn compiler_with_failing_chat() -> FlowCompiler {
    FlowCompiler::new(
        Arc::new(FailingGenerator),
        Arc::new(StubSearch),
        EngineConfig::default(),
    )
}

/// `input → message(template) → output`.
pub fn linear_graph(template: &str) -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph.add_node(Node::new("in", NodeConfig::Input)).unwrap();
    graph
        .add_node(Node::new(
            "msg",
            NodeConfig::Message {
                template: Some(template.to_string()),
            },
        ))
        .unwrap();
    graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
    graph.add_edge(Edge::new("e1", "in", "msg")).unwrap();
    graph.add_edge(Edge::new("e2", "msg", "out")).unwrap();
    graph
}

/// `input → branch → {left, right} → merge → output`.
pub fn diamond_graph() -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph.add_node(Node::new("in", NodeConfig::Input)).unwrap();
    graph.add_node(Node::new("fork", NodeConfig::Branch)).unwrap();
    graph
        .add_node(Node::new(
            "left",
            NodeConfig::Message {
                template: Some("왼쪽: {input}".to_string()),
            },
        ))
        .unwrap();
    graph
        .add_node(Node::new(
            "right",
            NodeConfig::Message {
                template: Some("오른쪽: {input}".to_string()),
            },
        ))
        .unwrap();
    graph.add_node(Node::new("join", NodeConfig::Merge)).unwrap();
    graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
    graph.add_edge(Edge::new("e1", "in", "fork")).unwrap();
    graph.add_edge(Edge::new("e2", "fork", "left")).unwrap();
    graph.add_edge(Edge::new("e3", "fork", "right")).unwrap();
    graph.add_edge(Edge::new("e4", "left", "join")).unwrap();
    graph.add_edge(Edge::new("e5", "right", "join")).unwrap();
    graph.add_edge(Edge::new("e6", "join", "out")).unwrap();
    graph
}

/// Compile `graph` and wire a runner over a fresh in-memory store.
pub fn runner_for(
    graph: &FlowGraph,
    compiler: &FlowCompiler,
    config: EngineConfig,
) -> (Arc<FlowRunner>, Arc<InMemorySessionStore>) {
    let plan = compiler.compile(graph).expect("fixture graph must compile");
    let store = Arc::new(InMemorySessionStore::new(config.rate_limit));
    let runner = Arc::new(FlowRunner::new(plan, store.clone(), config));
    (runner, store)
}
