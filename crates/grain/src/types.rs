use serde::{Deserialize, Serialize};
use geo_types::{Coord, LineString};

use crate::{
    config::AnalysisParameters,
    graph::BoundaryGraph,
    intersections::Intersection,
    motifs::Motif,
};

/// A position in pixel coordinates, `[x, y]` with the origin at the top-left corner
pub type Point = [f64; 2];

/// Convert a pixel-space polyline to a geo-types LineString
pub fn to_line_string(points: &[Point]) -> LineString<f64> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

/// Cumulative Euclidean length along a polyline
pub fn polyline_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = w[1][0] - w[0][0];
            let dy = w[1][1] - w[0][1];
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// Stereological results of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    /// Total motif length in millimetres
    #[serde(rename = "L_mm")]
    pub l_mm: f64,
    /// Weighted intersection count
    #[serde(rename = "N_int")]
    pub n_int: f64,
    /// Mean intercept length in millimetres
    pub ell_mm: f64,
    /// Mean intercept length in micrometres, two decimals
    pub ell_um: f64,
    /// ASTM grain size number, three decimals
    #[serde(rename = "G")]
    pub g: f64,
    /// Grains per square millimetre at 1x
    #[serde(rename = "N_AE")]
    pub n_ae: f64,
}

/// Pruned graph summary with per-edge geometry for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStats {
    pub n_nodes: usize,
    pub n_edges: usize,
    pub mean_edge_length_px: f64,
    pub edges: Vec<EdgeGeometry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeGeometry {
    pub id: usize,
    pub length_px: f64,
    pub coords: Vec<Point>,
}

impl EdgeStats {
    pub fn from_graph(graph: &BoundaryGraph) -> Self {
        Self {
            n_nodes: graph.node_count(),
            n_edges: graph.edge_count(),
            mean_edge_length_px: graph.mean_edge_length().unwrap_or(0.0),
            edges: graph
                .edges()
                .map(|edge| EdgeGeometry {
                    id: edge.id,
                    length_px: edge.length,
                    coords: edge.polyline.clone(),
                })
                .collect(),
        }
    }
}

/// Wall-clock seconds spent in each stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Timings {
    pub preprocess_s: f64,
    pub skeleton_s: f64,
    pub border_width_s: f64,
    pub graph_s: f64,
    pub intersections_s: f64,
    pub total_s: f64,
}

/// Graph sizes around the pruning step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DebugStats {
    pub nodes_before_pruning: usize,
    pub edges_before_pruning: usize,
    pub nodes_after_pruning: usize,
    pub edges_after_pruning: usize,
    pub prune_threshold_px: f64,
    pub edge_geometries_count: usize,
    pub raw_crossings: usize,
    pub border_width_px: f64,
    pub epsilon_px: f64,
}

/// Everything one analysis hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_width: u32,
    pub image_height: u32,
    pub metrics: Metrics,
    pub intersections: Vec<Intersection>,
    pub edges_stats: EdgeStats,
    pub motifs: Vec<Motif>,
    pub warnings: Vec<String>,
    pub timings: Timings,
    pub params_used: AnalysisParameters,
    pub debug_stats: DebugStats,
}

impl AnalysisResult {
    /// Pretty JSON rendering of the full result
    pub fn to_json_string(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether any warning mentions the given fragment
    pub fn has_warning(&self, fragment: &str) -> bool {
        self.warnings.iter().any(|w| w.contains(fragment))
    }
}
