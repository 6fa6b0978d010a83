//! # Grain Size Measurement Library
//!
//! Measures the ASTM E112 grain size number of a metallographic micrograph
//! with the stereological intercept method: the grain boundaries are
//! extracted, thinned to a one pixel skeleton, turned into a graph, and
//! crossed with synthetic lines or circles whose weighted intersection count
//! gives the mean intercept length.
//!
//! ## Core Features
//!
//! - **Composable extraction**: boundary extraction is a list of [`ImagePreprocessor`] steps
//! - **Skeleton graph**: junctions, endpoints and geodesic edge lengths, with spur pruning
//! - **Seeded motifs**: reproducible linear or circular measurement curves
//! - **Scored intersections**: clustering plus junction/regular/extremity weights
//! - **GeoJSON Support**: edges, motifs and intersections as one feature collection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grain::Pipeline;
//!
//! let pipeline = Pipeline::builder().build()?;
//!
//! let image = image::open("micrograph.png")?;
//! let analysis = pipeline.run(&image, 0.5)?;
//! println!("G = {}", analysis.result.metrics.g);
//!
//! analysis.result.save_geojson("result.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Parameter Overrides
//!
//! ```rust,no_run
//! use grain::{AnalysisParameters, Pipeline, algorithms::AreaOpening};
//!
//! let params = AnalysisParameters::from_overrides_str(
//!     r#"{ "epsilon_factor": 1.5, "motifs": { "type": "linear", "count": 20 } }"#,
//! )?;
//! let pipeline = Pipeline::builder()
//!     .params(params)
//!     .add_preprocessor(AreaOpening { min_size: 200 })
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod graph;
pub mod motifs;
pub mod intersections;
pub mod metrics;
pub mod pipeline;
pub mod io;
pub mod overlay;
pub mod mcp;
pub mod typed_geojson;

pub use error::{GrainError, Result};
pub use config::AnalysisParameters;
pub use types::{AnalysisResult, DebugStats, EdgeStats, Metrics, Point, Timings};
pub use traits::*;
pub use graph::{BoundaryGraph, NodeKind};
pub use motifs::{Motif, MotifKind, MotifParams};
pub use intersections::{AttributionPolicy, Intersection, IntersectionKind, NormProfile};
pub use pipeline::{Analysis, Artifacts, Pipeline, builder::PipelineBuilder};

/// Analyse an image file with default parameters plus optional JSON overrides
pub fn analyze_file<P: AsRef<std::path::Path>>(
    path: P,
    pixel_size_um: f64,
    overrides: Option<&serde_json::Value>,
) -> Result<Analysis> {
    let params = match overrides {
        Some(value) => AnalysisParameters::default().with_overrides(value)?,
        None => AnalysisParameters::default(),
    };
    let image = image::open(path)?;
    Pipeline::from_params(params)?.run(&image, pixel_size_um)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use serde_json::json;

    fn create_test_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(160, 160, Luma([220u8]));
        for k in [40u32, 80, 120] {
            for i in 0..160 {
                for w in 0..3 {
                    img.put_pixel(i, k + w, Luma([20u8]));
                    img.put_pixel(k + w, i, Luma([20u8]));
                }
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    fn test_params() -> AnalysisParameters {
        AnalysisParameters::default()
            .with_overrides(&json!({
                "adaptive_block_size": 41,
                "morph_open_kernel": 0,
                "area_opening_min_size_px": 0,
                "motifs": { "type": "linear", "count": 6, "orientations": [0.0, 90.0] }
            }))
            .expect("valid overrides")
    }

    #[test]
    fn test_pipeline_basic() {
        let pipeline = Pipeline::from_params(test_params()).expect("pipeline");
        let analysis = pipeline.run(&create_test_image(), 1.0).expect("Should analyse successfully");

        assert_eq!(analysis.result.image_width, 160);
        assert_eq!(analysis.result.image_height, 160);
        assert!(!analysis.artifacts.pruned_graph().is_empty(), "Should find boundaries");
        assert!(analysis.artifacts.pruned_graph().junctions().count() > 0);
    }

    #[test]
    fn test_params_used_are_reported() {
        let pipeline = Pipeline::from_params(test_params()).expect("pipeline");
        let analysis = pipeline.run(&create_test_image(), 1.0).expect("analysis");
        assert_eq!(analysis.result.params_used, test_params());
    }

    #[test]
    fn test_geojson_export() {
        let pipeline = Pipeline::from_params(test_params()).expect("pipeline");
        let analysis = pipeline.run(&create_test_image(), 1.0).expect("analysis");

        let geojson = analysis.result.to_geojson().expect("Should create GeoJSON");
        assert!(!geojson.features.is_empty());
    }

    #[test]
    fn test_analyze_file_missing() {
        let err = analyze_file("/nonexistent/micrograph.png", 1.0, None).unwrap_err();
        assert!(matches!(err, GrainError::ImageLoad(_)));
    }
}
