use std::collections::HashSet;

use image::GrayImage;
use tracing::debug;

use crate::{
    algorithms::skeleton::RING,
    graph::{BoundaryGraph, NodeId, NodeKind},
    types::Point,
};

/// Row-major pixel index to `[x, y]`. The only place rows become y.
pub fn pixel_position(index: usize, width: usize) -> Point {
    [(index % width) as f64, (index / width) as f64]
}

fn neighbours(index: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let (x, y) = ((index % width) as i64, (index / width) as i64);
    RING.iter().filter_map(move |&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        (nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64)
            .then(|| ny as usize * width + nx as usize)
    })
}

fn link(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Turn a one pixel wide skeleton into a boundary graph.
///
/// Pixels with one or at least three skeleton neighbours become nodes, ids in
/// raster order. Every chain of two-neighbour pixels between two nodes becomes
/// one edge. Chains returning to their start node and chains duplicating an
/// existing node pair are dropped, as are closed loops without any node.
pub fn build_graph(skeleton: &GrayImage) -> BoundaryGraph {
    let (width, height) = (skeleton.width() as usize, skeleton.height() as usize);
    let mut graph = BoundaryGraph::new(skeleton.width(), skeleton.height());
    if width == 0 || height == 0 {
        return graph;
    }

    let on: Vec<bool> = skeleton.pixels().map(|p| p[0] > 0).collect();
    let deg: Vec<usize> = (0..on.len())
        .map(|p| if on[p] { neighbours(p, width, height).filter(|&q| on[q]).count() } else { 0 })
        .collect();

    let mut node_at: Vec<Option<NodeId>> = vec![None; on.len()];
    let mut node_pixels = Vec::new();
    for p in 0..on.len() {
        if on[p] && (deg[p] == 1 || deg[p] >= 3) {
            node_at[p] = Some(graph.insert_node(pixel_position(p, width), NodeKind::from_degree(deg[p])));
            node_pixels.push(p);
        }
    }

    let mut used: HashSet<(usize, usize)> = HashSet::new();
    let (mut self_loops, mut parallel, mut open_chains) = (0usize, 0usize, 0usize);

    for &start in &node_pixels {
        let Some(start_node) = node_at[start] else { continue };
        let firsts: Vec<usize> = neighbours(start, width, height).filter(|&q| on[q]).collect();

        for first in firsts {
            if !used.insert(link(start, first)) {
                continue;
            }
            let mut path = vec![start, first];
            let (mut prev, mut cur) = (start, first);

            let end = loop {
                if let Some(id) = node_at[cur] {
                    break Some(id);
                }
                let next = neighbours(cur, width, height)
                    .find(|&q| on[q] && q != prev && !used.contains(&link(cur, q)));
                let Some(next) = next else { break None };
                used.insert(link(cur, next));
                path.push(next);
                prev = cur;
                cur = next;
            };

            let Some(end_node) = end else {
                open_chains += 1;
                continue;
            };
            if end_node == start_node {
                self_loops += 1;
                continue;
            }
            let polyline = path.iter().map(|&p| pixel_position(p, width)).collect();
            if graph.insert_edge(start_node, end_node, polyline).is_none() {
                parallel += 1;
            }
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        self_loops,
        parallel,
        open_chains,
        "skeleton graph built"
    );
    graph
}
