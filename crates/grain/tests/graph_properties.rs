mod common;

use common::synthetic;
use grain::{
    algorithms::{BoundaryExtractor, ZhangSuenThinner},
    graph::{build_graph, prune_below, prune_graph},
    AnalysisParameters, BoundaryGraph, SkeletonThinner,
};
use serde_json::json;

fn skeleton_graph(image: &image::DynamicImage) -> BoundaryGraph {
    let params = common::params(json!({
        "adaptive_block_size": 51,
        "morph_open_kernel": 0,
        "area_opening_min_size_px": 0
    }));
    let mask = BoundaryExtractor::from_params(&params).extract(image).expect("mask");
    let skeleton = ZhangSuenThinner.thin(&mask).expect("skeleton");
    build_graph(&skeleton)
}

fn scenes() -> Vec<BoundaryGraph> {
    vec![
        skeleton_graph(&synthetic::voronoi(240, 30, 2.5, 5)),
        skeleton_graph(&synthetic::grid(200, 40, 3)),
        skeleton_graph(&synthetic::y_junction(160)),
    ]
}

#[test]
fn pruning_is_monotone() {
    for graph in scenes() {
        let outcome = prune_graph(&graph, AnalysisParameters::default().skeleton_prune_ratio);
        assert!(outcome.graph.node_count() <= graph.node_count());
        assert!(outcome.graph.edge_count() <= graph.edge_count());
        assert_eq!(outcome.graph.edge_count() + outcome.removed_edges, graph.edge_count());
    }
}

#[test]
fn pruning_with_a_fixed_threshold_is_idempotent() {
    for graph in scenes() {
        let first = prune_graph(&graph, 0.5);
        let second = prune_below(&first.graph, first.threshold);
        assert_eq!(second.removed_edges, 0);
        assert_eq!(second.graph.edge_count(), first.graph.edge_count());
        assert_eq!(second.graph.node_count(), first.graph.node_count());
    }
}

#[test]
fn pruning_a_pruned_graph_changes_nothing() {
    for graph in scenes() {
        for ratio in [0.25, AnalysisParameters::default().skeleton_prune_ratio, 1.0] {
            let once = prune_graph(&graph, ratio);
            let twice = prune_graph(&once.graph, ratio);
            assert_eq!(twice.removed_edges, 0, "ratio {ratio}");
            assert_eq!(twice.graph.edge_count(), once.graph.edge_count());
            assert_eq!(twice.graph.node_count(), once.graph.node_count());
        }
    }
}

#[test]
fn larger_ratios_never_keep_more_edges() {
    for graph in scenes() {
        let kept: Vec<usize> = [0.0, 0.25, 0.5, 0.75, 1.0]
            .iter()
            .map(|&ratio| prune_graph(&graph, ratio).graph.edge_count())
            .collect();
        assert!(kept.windows(2).all(|w| w[1] <= w[0]), "edges kept per ratio: {kept:?}");
    }
}

#[test]
fn no_short_dangling_edge_survives() {
    for graph in scenes() {
        let outcome = prune_graph(&graph, 0.5);
        let pruned = &outcome.graph;
        for node in pruned.nodes().filter(|n| pruned.degree(n.id) == 1) {
            for edge_id in pruned.incident_edges(node.id) {
                let edge = pruned.edge(edge_id).expect("incident edge");
                assert!(edge.length >= outcome.threshold);
            }
        }
    }
}

#[test]
fn edges_stay_inside_the_image() {
    for graph in scenes() {
        let (w, h) = (graph.width() as f64, graph.height() as f64);
        for edge in graph.edges() {
            assert!(edge.length > 0.0);
            assert!(edge.polyline.iter().all(|p| p[0] >= 0.0 && p[0] < w && p[1] >= 0.0 && p[1] < h));
        }
    }
}
