//! Flow graph construction.
//!
//! # Overview
//!
//! [`SankeyGraph::build`] turns validated [`FlowRecord`]s into a directed
//! [`petgraph`] multigraph: one node per distinct label, one edge per record.
//!
//! ## Node ordering
//!
//! Node indices are assigned in first-seen order over every `source` value
//! (in record order) followed by every `target` value (in record order).
//! Given the same table, the same labels always get the same indices.
//!
//! ## Edges
//!
//! Edge `i` is record `i`. Records sharing a `(source, target)` pair become
//! parallel edges and are never merged; self-loops are kept as-is.
//!
//! ## Content hash
//!
//! The graph carries a BLAKE3 hash of its node labels and edges so run
//! summaries can tell two diagrams apart without diffing the output.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::connected_components;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::SankeyError;
use crate::loader::FlowRecord;

/// A uniquely labeled endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub label: String,
    pub index: usize,
}

/// A weighted `source → target` flow between two node indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// SankeyGraph
// ---------------------------------------------------------------------------

/// Nodes and edges of one diagram, in index and record order.
#[derive(Debug, Clone)]
pub struct SankeyGraph {
    /// Directed multigraph: nodes = labels, edge weights = flow values.
    pub graph: DiGraph<String, f64>,
    /// Mapping from label to petgraph `NodeIndex`.
    pub node_map: HashMap<String, NodeIndex>,
    /// BLAKE3 content hash (`blake3:<hex>`) of the node and edge lists.
    pub content_hash: String,
}

impl SankeyGraph {
    /// Build a graph from loaded records.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::EmptyData`] if `records` is empty.
    #[instrument(skip(records), fields(records = records.len()))]
    pub fn build(records: &[FlowRecord]) -> Result<Self, SankeyError> {
        if records.is_empty() {
            return Err(SankeyError::EmptyData);
        }

        let mut graph = DiGraph::<String, f64>::with_capacity(records.len(), records.len());
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        let labels = records
            .iter()
            .map(|r| &r.source)
            .chain(records.iter().map(|r| &r.target));
        for label in labels {
            if !node_map.contains_key(label) {
                let idx = graph.add_node(label.clone());
                node_map.insert(label.clone(), idx);
            }
        }

        for record in records {
            let source = node_map[&record.source];
            let target = node_map[&record.target];
            graph.add_edge(source, target, record.value);
        }

        let content_hash = compute_content_hash(&graph);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            %content_hash,
            "built flow graph"
        );

        Ok(Self {
            graph,
            node_map,
            content_hash,
        })
    }

    /// Return the number of distinct labels.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of flows (one per record).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the node index of a label.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.node_map.get(label).map(|idx| idx.index())
    }

    /// Return the label of the node at `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(String::as_str)
    }

    /// Nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.graph.node_indices().map(|idx| Node {
            label: self.graph[idx].clone(),
            index: idx.index(),
        })
    }

    /// Edges in record order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edge_references().map(|edge| Edge {
            source: edge.source().index(),
            target: edge.target().index(),
            value: *edge.weight(),
        })
    }

    /// Node labels in index order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_weights().map(String::as_str)
    }
}

fn compute_content_hash(graph: &DiGraph<String, f64>) -> String {
    let mut hasher = blake3::Hasher::new();
    for label in graph.node_weights() {
        hasher.update(label.as_bytes());
        hasher.update(b"\n");
    }
    for edge in graph.edge_references() {
        let line = format!(
            "{}\t{}\t{}\n",
            edge.source().index(),
            edge.target().index(),
            edge.weight()
        );
        hasher.update(line.as_bytes());
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

/// Summary statistics for a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Sum of all edge values.
    pub total_flow: f64,
    /// Edges whose source and target are the same node.
    pub self_loop_count: usize,
    /// Edges beyond the first between the same ordered node pair.
    pub parallel_edge_count: usize,
    /// Number of disjoint sub-diagrams.
    pub weakly_connected_component_count: usize,
    /// Nodes with no incoming flow.
    pub source_count: usize,
    /// Nodes with no outgoing flow.
    pub sink_count: usize,
}

impl GraphStats {
    /// Compute statistics for `sg`.
    #[must_use]
    pub fn from_graph(sg: &SankeyGraph) -> Self {
        let graph = &sg.graph;

        let total_flow = graph.edge_weights().sum();
        let self_loop_count = graph
            .edge_references()
            .filter(|e| e.source() == e.target())
            .count();

        let mut pair_counts: HashMap<(NodeIndex, NodeIndex), usize> = HashMap::new();
        for edge in graph.edge_references() {
            *pair_counts.entry((edge.source(), edge.target())).or_default() += 1;
        }
        let parallel_edge_count = pair_counts.values().map(|n| n - 1).sum();

        let no_neighbors = |idx: NodeIndex, dir: Direction| {
            graph.neighbors_directed(idx, dir).next().is_none()
        };
        let source_count = graph
            .node_indices()
            .filter(|&idx| no_neighbors(idx, Direction::Incoming))
            .count();
        let sink_count = graph
            .node_indices()
            .filter(|&idx| no_neighbors(idx, Direction::Outgoing))
            .count();

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            total_flow,
            self_loop_count,
            parallel_edge_count,
            weakly_connected_component_count: connected_components(graph),
            source_count,
            sink_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(source: &str, target: &str, value: f64) -> FlowRecord {
        FlowRecord::new(source, target, value)
    }

    fn labels(g: &SankeyGraph) -> Vec<&str> {
        g.labels().collect()
    }

    fn edge_triples(g: &SankeyGraph) -> Vec<(usize, usize, f64)> {
        g.edges().map(|e| (e.source, e.target, e.value)).collect()
    }

    #[test]
    fn empty_records_is_empty_data_error() {
        assert!(matches!(
            SankeyGraph::build(&[]),
            Err(SankeyError::EmptyData)
        ));
    }

    #[test]
    fn simple_chain() {
        let g = SankeyGraph::build(&[rec("A", "B", 10.0), rec("B", "C", 5.0)]).expect("build");
        assert_eq!(labels(&g), vec!["A", "B", "C"]);
        assert_eq!(edge_triples(&g), vec![(0, 1, 10.0), (1, 2, 5.0)]);
    }

    #[test]
    fn sources_are_indexed_before_targets() {
        // Z shows up (as a target) before C, but every source is indexed first.
        let g = SankeyGraph::build(&[rec("A", "Z", 1.0), rec("C", "A", 2.0), rec("Z", "B", 3.0)])
            .expect("build");
        assert_eq!(labels(&g), vec!["A", "C", "Z", "B"]);
        assert_eq!(g.index_of("Z"), Some(2));
        assert_eq!(g.index_of("B"), Some(3));
        assert_eq!(g.index_of("missing"), None);
    }

    #[test]
    fn ordering_is_stable_across_builds() {
        let records = vec![rec("x", "y", 1.0), rec("w", "x", 2.0), rec("y", "v", 3.0)];
        let first = SankeyGraph::build(&records).expect("build");
        for _ in 0..10 {
            let again = SankeyGraph::build(&records).expect("build");
            assert_eq!(labels(&again), labels(&first));
            assert_eq!(again.content_hash, first.content_hash);
        }
    }

    #[test]
    fn parallel_edges_are_not_merged() {
        let g = SankeyGraph::build(&[rec("A", "B", 1.0), rec("A", "B", 2.0)]).expect("build");
        assert_eq!(g.node_count(), 2);
        assert_eq!(edge_triples(&g), vec![(0, 1, 1.0), (0, 1, 2.0)]);
    }

    #[test]
    fn self_loops_pass_through() {
        let g = SankeyGraph::build(&[rec("A", "A", 4.0)]).expect("build");
        assert_eq!(g.node_count(), 1);
        assert_eq!(edge_triples(&g), vec![(0, 0, 4.0)]);
    }

    #[test]
    fn labels_are_exact_strings() {
        let g = SankeyGraph::build(&[rec("a", "A", 1.0), rec("A ", "a", 1.0)]).expect("build");
        assert_eq!(g.node_count(), 3);
    }

    #[test]
    fn content_hash_changes_with_values() {
        let a = SankeyGraph::build(&[rec("A", "B", 1.0)]).expect("build");
        let b = SankeyGraph::build(&[rec("A", "B", 2.0)]).expect("build");
        assert!(a.content_hash.starts_with("blake3:"));
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn stats_for_sample_shape() {
        let g = SankeyGraph::build(&[
            rec("A", "B", 10.0),
            rec("A", "C", 15.0),
            rec("B", "D", 8.0),
            rec("C", "D", 5.0),
            rec("C", "D", 1.0),
            rec("D", "D", 2.0),
            rec("X", "Y", 3.0),
        ])
        .expect("build");
        let stats = GraphStats::from_graph(&g);

        assert_eq!(stats.node_count, 6);
        assert_eq!(stats.edge_count, 7);
        assert!((stats.total_flow - 44.0).abs() < f64::EPSILON);
        assert_eq!(stats.self_loop_count, 1);
        assert_eq!(stats.parallel_edge_count, 1);
        assert_eq!(stats.weakly_connected_component_count, 2);
        // A and X have no inflow; Y has no outflow (D loops onto itself).
        assert_eq!(stats.source_count, 2);
        assert_eq!(stats.sink_count, 1);
    }
}
