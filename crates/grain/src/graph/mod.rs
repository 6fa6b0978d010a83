//! Planar boundary graph over the skeleton.
//!
//! Nodes and edges live in id-keyed tables so pruning can drop entries
//! without renumbering. Ids are never reused within one graph.

pub mod build;
pub mod prune;

pub use build::{build_graph, pixel_position};
pub use prune::{prune_below, prune_graph, PruneOutcome};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{polyline_length, Point};

pub type NodeId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Endpoint,
    Junction,
    Path,
}

impl NodeKind {
    /// Kind implied by the number of skeleton neighbours
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            1 => NodeKind::Endpoint,
            2 => NodeKind::Path,
            _ => NodeKind::Junction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub position: Point,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
    /// Cumulative length of `polyline`, in pixels
    pub length: f64,
    /// Ordered pixel path from `a` to `b`, both ends included
    pub polyline: Vec<Point>,
}

/// Undirected simple graph: no self-loops, at most one edge per node pair
#[derive(Debug, Clone, Default)]
pub struct BoundaryGraph {
    width: u32,
    height: u32,
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<EdgeId, GraphEdge>,
    incident: BTreeMap<NodeId, BTreeSet<EdgeId>>,
    next_node: NodeId,
    next_edge: EdgeId,
}

impl BoundaryGraph {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn insert_node(&mut self, position: Point, kind: NodeKind) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, GraphNode { id, position, kind });
        self.incident.insert(id, BTreeSet::new());
        id
    }

    /// Add an edge along `polyline`.
    ///
    /// Returns `None` for self-loops, unknown endpoints and node pairs that
    /// are already connected.
    pub fn insert_edge(&mut self, a: NodeId, b: NodeId, polyline: Vec<Point>) -> Option<EdgeId> {
        if a == b || !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return None;
        }
        if self.edge_between(a, b).is_some() {
            return None;
        }

        let id = self.next_edge;
        self.next_edge += 1;
        let length = polyline_length(&polyline);
        self.edges.insert(id, GraphEdge { id, a, b, length, polyline });
        self.incident.entry(a).or_default().insert(id);
        self.incident.entry(b).or_default().insert(id);
        Some(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        let edge = self.edges.remove(&id)?;
        for end in [edge.a, edge.b] {
            if let Some(set) = self.incident.get_mut(&end) {
                set.remove(&id);
            }
        }
        Some(edge)
    }

    /// Remove a node that no edge touches any more
    pub fn remove_isolated_node(&mut self, id: NodeId) -> Option<GraphNode> {
        if self.degree(id) != 0 {
            return None;
        }
        self.incident.remove(&id);
        self.nodes.remove(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges touching `id` (0 for unknown nodes)
    pub fn degree(&self, id: NodeId) -> usize {
        self.incident.get(&id).map_or(0, |set| set.len())
    }

    pub fn incident_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.incident.get(&id).into_iter().flat_map(|set| set.iter().copied())
    }

    /// Neighbouring node ids of `id`
    pub fn adjacency(&self, id: NodeId) -> Vec<NodeId> {
        self.incident_edges(id)
            .filter_map(|e| self.edges.get(&e))
            .map(|edge| if edge.a == id { edge.b } else { edge.a })
            .collect()
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.incident_edges(a).find(|e| {
            self.edges
                .get(e)
                .is_some_and(|edge| (edge.a == a && edge.b == b) || (edge.a == b && edge.b == a))
        })
    }

    pub fn junctions(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| n.kind == NodeKind::Junction)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| n.kind == NodeKind::Endpoint)
    }

    pub fn total_edge_length(&self) -> f64 {
        self.edges.values().map(|e| e.length).sum()
    }

    pub fn mean_edge_length(&self) -> Option<f64> {
        if self.edges.is_empty() {
            return None;
        }
        Some(self.total_edge_length() / self.edges.len() as f64)
    }

    pub fn median_edge_length(&self) -> Option<f64> {
        let mut lengths: Vec<f64> = self.edges.values().map(|e| e.length).collect();
        if lengths.is_empty() {
            return None;
        }
        lengths.sort_by(|a, b| a.total_cmp(b));
        let mid = lengths.len() / 2;
        Some(if lengths.len() % 2 == 0 {
            (lengths[mid - 1] + lengths[mid]) / 2.0
        } else {
            lengths[mid]
        })
    }
}
