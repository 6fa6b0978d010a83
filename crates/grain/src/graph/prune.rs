use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::{BoundaryGraph, EdgeId, NodeId};

#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub graph: BoundaryGraph,
    /// Length below which dangling edges were removed, in pixels
    pub threshold: f64,
    pub removed_edges: usize,
    pub removed_nodes: usize,
    pub iterations: usize,
}

/// Prune dangling edges shorter than `ratio` times the median edge length.
///
/// The median is taken again on the pruned graph and pruning repeats until a
/// pass removes nothing, so pruning the result with the same ratio is a no-op.
/// `threshold` is the one used by that last pass.
pub fn prune_graph(graph: &BoundaryGraph, ratio: f64) -> PruneOutcome {
    let mut outcome = PruneOutcome {
        graph: graph.clone(),
        threshold: 0.0,
        removed_edges: 0,
        removed_nodes: 0,
        iterations: 0,
    };
    let mut passes = 0;
    while let Some(median) = outcome.graph.median_edge_length() {
        let pass = prune_below(&outcome.graph, ratio * median);
        passes += 1;
        outcome.threshold = pass.threshold;
        if pass.removed_edges == 0 {
            break;
        }
        outcome.graph = pass.graph;
        outcome.removed_edges += pass.removed_edges;
        outcome.removed_nodes += pass.removed_nodes;
        outcome.iterations += pass.iterations;
    }
    debug!(
        ratio,
        threshold = outcome.threshold,
        removed_edges = outcome.removed_edges,
        passes,
        "median pruning settled"
    );
    outcome
}

/// Repeatedly drop dangling edges shorter than `threshold` until none is left
pub fn prune_below(graph: &BoundaryGraph, threshold: f64) -> PruneOutcome {
    let mut pruned = graph.clone();
    let (mut removed_edges, mut removed_nodes, mut iterations) = (0, 0, 0);

    loop {
        let marked: BTreeSet<EdgeId> = pruned
            .nodes()
            .filter(|node| pruned.degree(node.id) == 1)
            .filter_map(|node| pruned.incident_edges(node.id).next())
            .filter(|&id| pruned.edge(id).is_some_and(|edge| edge.length < threshold))
            .collect();
        if marked.is_empty() {
            break;
        }
        iterations += 1;

        let mut touched: BTreeSet<NodeId> = BTreeSet::new();
        for id in marked {
            if let Some(edge) = pruned.remove_edge(id) {
                touched.insert(edge.a);
                touched.insert(edge.b);
                removed_edges += 1;
            }
        }
        for node in touched {
            if pruned.remove_isolated_node(node).is_some() {
                removed_nodes += 1;
            }
        }
    }

    debug!(threshold, removed_edges, removed_nodes, iterations, "graph pruned");
    PruneOutcome {
        graph: pruned,
        threshold,
        removed_edges,
        removed_nodes,
        iterations,
    }
}
