pub mod builder;

use std::time::Instant;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

use crate::{
    algorithms::{estimate_border_width, BoundaryExtractor},
    config::AnalysisParameters,
    error::{GrainError, Result},
    graph::{build_graph, prune_graph, BoundaryGraph},
    intersections::{detect_intersections, Intersection, IntersectionSettings},
    metrics::compute_metrics,
    motifs::{generate_motifs, Motif},
    traits::SkeletonThinner,
    types::{AnalysisResult, DebugStats, EdgeStats, Timings},
};

/// Intermediate products of one run, kept for overlays and inspection
#[derive(Debug, Clone)]
pub struct Artifacts {
    mask: GrayImage,
    skeleton: GrayImage,
    raw_graph: BoundaryGraph,
    pruned_graph: BoundaryGraph,
    motifs: Vec<Motif>,
    intersections: Vec<Intersection>,
    border_width: f64,
    epsilon_px: f64,
}

impl Artifacts {
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn skeleton(&self) -> &GrayImage {
        &self.skeleton
    }

    pub fn raw_graph(&self) -> &BoundaryGraph {
        &self.raw_graph
    }

    pub fn pruned_graph(&self) -> &BoundaryGraph {
        &self.pruned_graph
    }

    pub fn motifs(&self) -> &[Motif] {
        &self.motifs
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn border_width(&self) -> f64 {
        self.border_width
    }

    pub fn epsilon_px(&self) -> f64 {
        self.epsilon_px
    }
}

/// Result of [`Pipeline::run`]: the report plus everything it was computed from
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub artifacts: Artifacts,
}

/// Measurement pipeline from micrograph to grain size metrics
pub struct Pipeline {
    extractor: BoundaryExtractor,
    thinner: Box<dyn SkeletonThinner>,
    params: AnalysisParameters,
}

fn seconds_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a pipeline with the given components
    pub fn new(
        extractor: BoundaryExtractor,
        thinner: Box<dyn SkeletonThinner>,
        params: AnalysisParameters,
    ) -> Self {
        Self {
            extractor,
            thinner,
            params,
        }
    }

    /// Standard pipeline for a validated parameter set
    pub fn from_params(params: AnalysisParameters) -> Result<Self> {
        Self::builder().params(params).build()
    }

    pub fn params(&self) -> &AnalysisParameters {
        &self.params
    }

    /// Boundary extraction only
    pub fn preprocess(&self, image: &DynamicImage) -> Result<GrayImage> {
        self.extractor.extract(image)
    }

    /// Run every stage on one image.
    ///
    /// `pixel_size_um` is the physical size of one pixel and must be a
    /// positive finite number. Fails when no motif survives clipping.
    pub fn run(&self, image: &DynamicImage, pixel_size_um: f64) -> Result<Analysis> {
        if !pixel_size_um.is_finite() || pixel_size_um <= 0.0 {
            return Err(GrainError::InvalidPixelSize(pixel_size_um));
        }
        let params = &self.params;
        let total = Instant::now();
        let (width, height) = (image.width(), image.height());
        info!(width, height, pixel_size_um, "starting grain size analysis");

        let started = Instant::now();
        let mask = self.extractor.extract(image)?;
        let preprocess_s = seconds_since(started);

        let started = Instant::now();
        let skeleton = self.thinner.thin(&mask)?;
        let skeleton_s = seconds_since(started);

        let started = Instant::now();
        let border_width = estimate_border_width(&mask, &skeleton);
        let border_width_s = seconds_since(started);
        let epsilon_px = border_width * params.epsilon_factor;
        debug!(border_width, epsilon_px, "boundary width estimated");

        let started = Instant::now();
        let raw_graph = build_graph(&skeleton);
        let pruned = prune_graph(&raw_graph, params.skeleton_prune_ratio);
        let graph_s = seconds_since(started);

        let motifs = generate_motifs(width, height, &params.motifs, params.random_seed);
        if motifs.is_empty() {
            return Err(GrainError::NoUsableMotifs(format!(
                "{:?} motifs on a {width}x{height} image",
                params.motifs.kind()
            )));
        }

        let started = Instant::now();
        let settings = IntersectionSettings {
            epsilon_px,
            profile: params.norm_profile(),
            attribution: params.motif_attribution,
        };
        let outcome = detect_intersections(&motifs, &pruned.graph, &settings);
        let intersections_s = seconds_since(started);

        let (metrics, warnings) = compute_metrics(&motifs, &outcome.intersections, pixel_size_um);

        let debug_stats = DebugStats {
            nodes_before_pruning: raw_graph.node_count(),
            edges_before_pruning: raw_graph.edge_count(),
            nodes_after_pruning: pruned.graph.node_count(),
            edges_after_pruning: pruned.graph.edge_count(),
            prune_threshold_px: pruned.threshold,
            edge_geometries_count: pruned.graph.edges().filter(|e| e.polyline.len() >= 2).count(),
            raw_crossings: outcome.raw_crossings,
            border_width_px: border_width,
            epsilon_px,
        };
        let timings = Timings {
            preprocess_s,
            skeleton_s,
            border_width_s,
            graph_s,
            intersections_s,
            total_s: seconds_since(total),
        };

        info!(
            intersections = outcome.intersections.len(),
            n_int = metrics.n_int,
            g = metrics.g,
            warnings = warnings.len(),
            total_s = timings.total_s,
            "analysis finished"
        );

        let result = AnalysisResult {
            image_width: width,
            image_height: height,
            metrics,
            intersections: outcome.intersections.clone(),
            edges_stats: EdgeStats::from_graph(&pruned.graph),
            motifs: motifs.clone(),
            warnings,
            timings,
            params_used: params.clone(),
            debug_stats,
        };
        let artifacts = Artifacts {
            mask,
            skeleton,
            raw_graph,
            pruned_graph: pruned.graph,
            motifs,
            intersections: outcome.intersections,
            border_width,
            epsilon_px,
        };
        Ok(Analysis { result, artifacts })
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: boundary extraction [{}], thinning, graph pruning (ratio {}), {:?} motifs, {} scoring",
            self.extractor.step_names().join(" -> "),
            self.params.skeleton_prune_ratio,
            self.params.motifs.kind(),
            self.params.norm_profile(),
        )
    }
}
