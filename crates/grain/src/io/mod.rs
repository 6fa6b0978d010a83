//! Export of analysis results.
//!
//! GeoJSON conversions are implemented directly on [`crate::AnalysisResult`].

pub mod geojson;
