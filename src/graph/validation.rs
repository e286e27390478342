//! Structural validation of a [`FlowGraph`] before any run is admitted.
//!
//! Checks run in fixed precedence: node counts, then cycles, then
//! reachability, then edge emptiness. The checks are independent, so the
//! order never changes whether a graph is admissible, only which reason is
//! reported first.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::model::FlowGraph;
use crate::types::NodeId;

/// Why a graph was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("graph must contain exactly one input node, found {0}")]
    InputNodeCount(usize),

    #[error("graph must contain exactly one output node, found {0}")]
    OutputNodeCount(usize),

    #[error("graph contains a cycle through node {0}")]
    Cycle(NodeId),

    #[error("node {0} is not on any path from the input node to the output node")]
    Unreachable(NodeId),

    #[error("graph has no edges")]
    NoEdges,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Validate the structural invariants. Returns the first violation in the
/// fixed precedence order.
pub fn validate(graph: &FlowGraph) -> Result<(), ValidationError> {
    let input_id = check_singletons(graph)?;
    let output_id = find_output(graph);

    check_acyclic(graph)?;
    check_reachability(graph, &input_id, &output_id)?;

    if graph.edges().is_empty() {
        return Err(ValidationError::NoEdges);
    }
    Ok(())
}

fn check_singletons(graph: &FlowGraph) -> Result<NodeId, ValidationError> {
    let inputs: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|n| n.config.node_type().is_input())
        .collect();
    if inputs.len() != 1 {
        return Err(ValidationError::InputNodeCount(inputs.len()));
    }
    let outputs = graph
        .nodes()
        .iter()
        .filter(|n| n.config.node_type().is_output())
        .count();
    if outputs != 1 {
        return Err(ValidationError::OutputNodeCount(outputs));
    }
    Ok(inputs[0].id.clone())
}

fn find_output(graph: &FlowGraph) -> NodeId {
    graph
        .nodes()
        .iter()
        .find(|n| n.config.node_type().is_output())
        .map(|n| n.id.clone())
        .unwrap_or_default()
}

/// DFS coloring over the full node set; a back-edge to a grey node is a
/// cycle.
fn check_acyclic(graph: &FlowGraph) -> Result<(), ValidationError> {
    let outgoing = graph.outgoing();
    let mut colors: FxHashMap<&str, Color> = graph
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();

    for node in graph.nodes() {
        if colors[node.id.as_str()] == Color::White {
            dfs_color(node.id.as_str(), &outgoing, &mut colors)?;
        }
    }
    Ok(())
}

fn dfs_color<'a>(
    start: &'a str,
    outgoing: &'a FxHashMap<NodeId, Vec<NodeId>>,
    colors: &mut FxHashMap<&'a str, Color>,
) -> Result<(), ValidationError> {
    // Explicit stack with a post-visit marker, so deep graphs cannot overflow
    // the call stack.
    let mut stack: Vec<(&str, bool)> = vec![(start, false)];
    while let Some((id, leaving)) = stack.pop() {
        if leaving {
            colors.insert(id, Color::Black);
            continue;
        }
        match colors.get(id).copied() {
            Some(Color::Black) => continue,
            Some(Color::Grey) => continue,
            _ => {}
        }
        colors.insert(id, Color::Grey);
        stack.push((id, true));
        if let Some(targets) = outgoing.get(id) {
            for target in targets {
                match colors.get(target.as_str()).copied() {
                    Some(Color::Grey) => {
                        return Err(ValidationError::Cycle(target.clone()));
                    }
                    Some(Color::White) | None => stack.push((target.as_str(), false)),
                    Some(Color::Black) => {}
                }
            }
        }
    }
    Ok(())
}

/// Every node must be forward-reachable from the input node and
/// backward-reachable from the output node.
fn check_reachability(
    graph: &FlowGraph,
    input_id: &str,
    output_id: &str,
) -> Result<(), ValidationError> {
    let forward = bfs(input_id, &graph.outgoing());
    let backward = bfs(output_id, &graph.incoming());

    for node in graph.nodes() {
        if !forward.contains(node.id.as_str()) || !backward.contains(node.id.as_str()) {
            return Err(ValidationError::Unreachable(node.id.clone()));
        }
    }
    Ok(())
}

fn bfs(start: &str, adjacency: &FxHashMap<NodeId, Vec<NodeId>>) -> FxHashSet<NodeId> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue = std::collections::VecDeque::new();
    seen.insert(start.to_string());
    queue.push_back(start.to_string());
    while let Some(id) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(&id) {
            for next in neighbors {
                if seen.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node, NodeConfig};

    fn linear_graph() -> FlowGraph {
        let mut graph = FlowGraph::new();
        graph.add_node(Node::new("in", NodeConfig::Input)).unwrap();
        graph
            .add_node(Node::new("mid", NodeConfig::Message { template: None }))
            .unwrap();
        graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
        graph.add_edge(Edge::new("e1", "in", "mid")).unwrap();
        graph.add_edge(Edge::new("e2", "mid", "out")).unwrap();
        graph
    }

    #[test]
    fn linear_graph_is_admissible() {
        assert_eq!(validate(&linear_graph()), Ok(()));
    }

    #[test]
    fn missing_input_reports_node_count_first() {
        let mut graph = FlowGraph::new();
        graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
        assert_eq!(validate(&graph), Err(ValidationError::InputNodeCount(0)));
    }

    #[test]
    fn two_inputs_rejected() {
        let mut graph = linear_graph();
        graph.add_node(Node::new("in2", NodeConfig::Input)).unwrap();
        assert_eq!(validate(&graph), Err(ValidationError::InputNodeCount(2)));
    }

    #[test]
    fn cycle_detected_even_with_valid_endpoints() {
        let mut graph = FlowGraph::new();
        graph.add_node(Node::new("in", NodeConfig::Input)).unwrap();
        graph
            .add_node(Node::new("a", NodeConfig::Message { template: None }))
            .unwrap();
        graph
            .add_node(Node::new("b", NodeConfig::Message { template: None }))
            .unwrap();
        graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
        graph.add_edge(Edge::new("e1", "in", "a")).unwrap();
        graph.add_edge(Edge::new("e2", "a", "b")).unwrap();
        graph.add_edge(Edge::new("e3", "b", "a")).unwrap();
        graph.add_edge(Edge::new("e4", "b", "out")).unwrap();
        assert!(matches!(validate(&graph), Err(ValidationError::Cycle(_))));
    }

    #[test]
    fn stranded_node_rejected_then_admitted_after_linking() {
        let mut graph = linear_graph();
        graph
            .add_node(Node::new("island", NodeConfig::Search))
            .unwrap();
        assert_eq!(
            validate(&graph),
            Err(ValidationError::Unreachable("island".into()))
        );

        // Linking the island into the input→output path makes the same graph
        // admissible.
        graph.add_edge(Edge::new("e3", "in", "island")).unwrap();
        graph.add_edge(Edge::new("e4", "island", "out")).unwrap();
        assert_eq!(validate(&graph), Ok(()));
    }

    #[test]
    fn edgeless_graph_rejected() {
        let mut graph = FlowGraph::new();
        graph.add_node(Node::new("in", NodeConfig::Input)).unwrap();
        graph.add_node(Node::new("out", NodeConfig::Output)).unwrap();
        // With no edges, reachability already fails for the output node; the
        // emptiness reason is reserved for graphs where the two coincide.
        assert!(validate(&graph).is_err());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = linear_graph();
        graph.add_edge(Edge::new("loop", "mid", "mid")).unwrap();
        assert_eq!(validate(&graph), Err(ValidationError::Cycle("mid".into())));
    }
}
