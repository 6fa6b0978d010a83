mod common;

use common::{params, synthetic};
use grain::{IntersectionKind, Pipeline};
use serde_json::json;

const VORONOI_SIZE: u32 = 480;

fn voronoi_pipeline() -> Pipeline {
    Pipeline::from_params(params(json!({
        "adaptive_block_size": 51,
        "morph_open_kernel": 0,
        "area_opening_min_size_px": 0,
        "epsilon_factor": 1.5,
        "motifs": {
            "type": "linear",
            "count": 5,
            "length_px": 2.0 * VORONOI_SIZE as f64,
            "orientations": [0.0, 90.0]
        }
    })))
    .expect("pipeline")
}

#[test]
fn y_junction_produces_a_degree_three_node() {
    let pipeline = Pipeline::from_params(params(json!({
        "adaptive_block_size": 51,
        "morph_open_kernel": 0,
        "area_opening_min_size_px": 0,
        "motifs": { "type": "circular", "count": 2 }
    })))
    .expect("pipeline");

    let analysis = pipeline.run(&synthetic::y_junction(200), 1.0).expect("analysis");
    let graph = analysis.artifacts.raw_graph();

    assert!(graph.edge_count() >= 3);
    assert!(
        graph.nodes().any(|n| graph.degree(n.id) == 3),
        "no degree-3 node among {} nodes",
        graph.node_count()
    );
    assert!(analysis.artifacts.pruned_graph().junctions().count() >= 1);
}

#[test]
fn voronoi_cells_give_a_grain_size() {
    let analysis = voronoi_pipeline()
        .run(&synthetic::voronoi(VORONOI_SIZE, 30, 2.5, 7), 1.0)
        .expect("analysis");
    let result = &analysis.result;

    assert_eq!(result.motifs.len(), 5);
    for motif in &result.motifs {
        assert!((motif.length_px - VORONOI_SIZE as f64).abs() < 1e-6, "motif {} is not full width", motif.id);
    }

    assert!(result.metrics.n_int > 0.0);
    assert!(result.metrics.ell_um > 0.0);
    assert_ne!(result.metrics.g, 0.0);
    assert!(!result.has_warning("No intersections found"), "warnings: {:?}", result.warnings);
    assert!(!result.has_warning("Low number of intersections"), "warnings: {:?}", result.warnings);

    let total: f64 = result.intersections.iter().map(|i| i.score).sum();
    assert!((total - result.metrics.n_int).abs() < 1e-9);
    assert!(result.intersections.iter().any(|i| i.kind == IntersectionKind::Regular));
}

#[test]
fn voronoi_run_is_reproducible() {
    let image = synthetic::voronoi(VORONOI_SIZE, 30, 2.5, 7);
    let first = voronoi_pipeline().run(&image, 0.8).expect("first run");
    let second = voronoi_pipeline().run(&image, 0.8).expect("second run");

    assert_eq!(first.result.metrics, second.result.metrics);
    assert_eq!(first.result.intersections, second.result.intersections);
    assert_eq!(first.result.motifs, second.result.motifs);
}

#[test]
fn smaller_pixels_mean_finer_grains() {
    let image = synthetic::voronoi(VORONOI_SIZE, 30, 2.5, 11);
    let coarse = voronoi_pipeline().run(&image, 2.0).expect("coarse");
    let fine = voronoi_pipeline().run(&image, 0.5).expect("fine");

    assert_eq!(coarse.result.metrics.n_int, fine.result.metrics.n_int);
    assert!(fine.result.metrics.g > coarse.result.metrics.g);
}

#[test]
fn result_serializes_to_json_and_geojson() {
    let pipeline = Pipeline::from_params(params(json!({
        "adaptive_block_size": 41,
        "morph_open_kernel": 0,
        "area_opening_min_size_px": 0,
        "motifs": { "type": "linear", "count": 4, "orientations": [0.0, 90.0] }
    })))
    .expect("pipeline");
    let analysis = pipeline.run(&synthetic::grid(240, 48, 3), 1.5).expect("analysis");

    let text = analysis.result.to_json_string().expect("json");
    let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
    for key in ["L_mm", "N_int", "ell_mm", "ell_um", "G", "N_AE"] {
        assert!(value["metrics"].get(key).is_some(), "missing metric {key}");
    }
    assert_eq!(value["image_width"], 240);
    assert_eq!(value["params_used"]["adaptive_block_size"], 41);

    let geojson = analysis.result.to_typed_geojson().expect("typed geojson");
    assert_eq!(geojson.layer("motif").len(), analysis.result.motifs.len());
    assert_eq!(geojson.layer("edge").len(), analysis.result.edges_stats.edges.len());
    assert!((geojson.total_score() - analysis.result.metrics.n_int).abs() < 1e-9);
}

#[test]
fn preprocess_preview_matches_run_mask() {
    let pipeline = voronoi_pipeline();
    let image = synthetic::voronoi(240, 30, 2.5, 3);
    let preview = pipeline.preprocess(&image).expect("mask");
    let analysis = pipeline.run(&image, 1.0).expect("analysis");
    assert_eq!(&preview, analysis.artifacts.mask());
}
