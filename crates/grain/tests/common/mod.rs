#![allow(dead_code)]

pub mod synthetic;

use grain::AnalysisParameters;
use serde_json::Value;

/// Defaults with the given overrides, panicking on malformed test input
pub fn params(overrides: Value) -> AnalysisParameters {
    AnalysisParameters::default()
        .with_overrides(&overrides)
        .expect("valid test overrides")
}
