//! Analysis parameters, parameter files and override merging.
//!
//! The pipeline always receives a fully populated [`AnalysisParameters`].
//! Callers that only know a few values start from the defaults and overlay a
//! partial JSON object with [`AnalysisParameters::with_overrides`].

use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{GrainError, Result},
    intersections::{AttributionPolicy, NormProfile},
    motifs::MotifParams,
};

/// Complete parameter set for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisParameters {
    /// Sigma of the denoising Gaussian blur (0 disables the blur)
    #[schemars(range(min = 0.0, max = 20.0))]
    pub gaussian_sigma: f32,
    /// Window size of the local threshold, odd and greater than 1
    pub adaptive_block_size: u32,
    /// Value subtracted from the local mean before comparing
    pub adaptive_offset: f64,
    /// Side of the square opening kernel (<= 0 disables the opening)
    pub morph_open_kernel: i32,
    /// Components smaller than this many pixels are dropped (<= 0 disables)
    pub area_opening_min_size_px: i64,
    /// Best-effort removal of long straight twin lines
    pub detect_twins: bool,
    /// Dangling edges shorter than `ratio * median edge length` are pruned
    pub skeleton_prune_ratio: f64,
    /// Clustering radius as a multiple of the estimated boundary width
    pub epsilon_factor: f64,
    /// Name of the scoring table, see [`NormProfile`]
    pub norm_profile: String,
    /// Seed for motif placement
    pub random_seed: u64,
    /// Which motif a cluster of crossings is attributed to
    pub motif_attribution: AttributionPolicy,
    /// Measurement curves overlaid on the image
    pub motifs: MotifParams,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            gaussian_sigma: 1.0,
            adaptive_block_size: 101,
            adaptive_offset: 10.0,
            morph_open_kernel: 3,
            area_opening_min_size_px: 500,
            detect_twins: false,
            skeleton_prune_ratio: 0.5,
            epsilon_factor: 1.0,
            norm_profile: NormProfile::default().to_string(),
            random_seed: 42,
            motif_attribution: AttributionPolicy::default(),
            motifs: MotifParams::default(),
        }
    }
}

impl AnalysisParameters {
    /// Overlay a partial JSON object onto these parameters.
    ///
    /// Top-level keys replace the current value wholesale, so `{"motifs": {...}}`
    /// swaps the complete motif configuration. Unknown keys, type mismatches
    /// and non-object overrides are rejected.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        let Value::Object(updates) = overrides else {
            return Err(GrainError::InvalidParameters(format!(
                "overrides must be a JSON object, got {overrides}"
            )));
        };

        let mut merged = serde_json::to_value(self)?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in updates {
                base.insert(key.clone(), value.clone());
            }
        }

        let params: Self = serde_json::from_value(merged)
            .map_err(|e| GrainError::InvalidParameters(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Defaults with a JSON override string applied (empty string means no overrides)
    pub fn from_overrides_str(overrides: &str) -> Result<Self> {
        let defaults = Self::default();
        if overrides.trim().is_empty() {
            return Ok(defaults);
        }
        let value: Value = serde_json::from_str(overrides)
            .map_err(|e| GrainError::InvalidParameters(format!("malformed JSON overrides: {e}")))?;
        defaults.with_overrides(&value)
    }

    /// Check the invariants the stages rely on
    pub fn validate(&self) -> Result<()> {
        if self.adaptive_block_size <= 1 || self.adaptive_block_size % 2 == 0 {
            return Err(GrainError::InvalidParameters(format!(
                "adaptive_block_size must be odd and greater than 1, got {}",
                self.adaptive_block_size
            )));
        }
        if !self.gaussian_sigma.is_finite() || self.gaussian_sigma < 0.0 {
            return Err(GrainError::InvalidParameters(format!(
                "gaussian_sigma must be a non-negative number, got {}",
                self.gaussian_sigma
            )));
        }
        if !self.adaptive_offset.is_finite() {
            return Err(GrainError::InvalidParameters(
                "adaptive_offset must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("skeleton_prune_ratio", self.skeleton_prune_ratio),
            ("epsilon_factor", self.epsilon_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GrainError::InvalidParameters(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        self.motifs.validate()
    }

    /// Resolve the configured norm profile name (unknown names fall back to ASTM)
    pub fn norm_profile(&self) -> NormProfile {
        NormProfile::resolve(&self.norm_profile)
    }

    /// JSON schema describing the parameter object
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisParameters)
    }

    /// Load parameters from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load parameters from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let params: AnalysisParameters = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load parameters from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let params: AnalysisParameters = serde_json::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Auto-detect file format and load parameters
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(GrainError::UnsupportedFileFormat),
        }
    }

    /// Convert parameters to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert parameters to a pretty JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let params = AnalysisParameters::default();
        params.validate().expect("defaults should validate");
        assert_eq!(params.adaptive_block_size, 101);
        assert_eq!(params.norm_profile(), NormProfile::Astm);
        assert!(matches!(params.motifs, MotifParams::Circular { count: 3 }));
    }

    #[test]
    fn overrides_replace_only_given_keys() {
        let params = AnalysisParameters::default()
            .with_overrides(&json!({
                "gaussian_sigma": 2.5,
                "motifs": { "type": "linear", "count": 5, "orientations": [0.0, 90.0] }
            }))
            .expect("overrides should apply");

        assert_eq!(params.gaussian_sigma, 2.5);
        assert_eq!(params.adaptive_block_size, 101);
        match params.motifs {
            MotifParams::Linear { count, length_px, ref orientations } => {
                assert_eq!(count, 5);
                assert!(length_px.is_none());
                assert_eq!(orientations, &vec![0.0, 90.0]);
            }
            other => panic!("expected linear motifs, got {other:?}"),
        }
    }

    #[test]
    fn unknown_override_key_is_rejected() {
        let err = AnalysisParameters::default()
            .with_overrides(&json!({ "gausian_sigma": 2.0 }))
            .unwrap_err();
        assert!(matches!(err, GrainError::InvalidParameters(_)));
    }

    #[test]
    fn non_object_override_is_rejected() {
        let err = AnalysisParameters::default()
            .with_overrides(&json!([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, GrainError::InvalidParameters(_)));
    }

    #[test]
    fn malformed_override_string_is_rejected() {
        let err = AnalysisParameters::from_overrides_str("{ not json").unwrap_err();
        assert!(matches!(err, GrainError::InvalidParameters(_)));
        assert_eq!(
            AnalysisParameters::from_overrides_str("  ").expect("blank means defaults"),
            AnalysisParameters::default()
        );
    }

    #[test]
    fn even_block_size_fails_validation() {
        let err = AnalysisParameters::default()
            .with_overrides(&json!({ "adaptive_block_size": 100 }))
            .unwrap_err();
        assert!(err.to_string().contains("adaptive_block_size"));

        let err = AnalysisParameters::default()
            .with_overrides(&json!({ "adaptive_block_size": 1 }))
            .unwrap_err();
        assert!(matches!(err, GrainError::InvalidParameters(_)));
    }

    #[test]
    fn toml_round_trip_keeps_motifs() {
        let params = AnalysisParameters::default()
            .with_overrides(&json!({ "norm_profile": "Circular", "random_seed": 7 }))
            .expect("overrides should apply");
        let text = params.to_toml().expect("serialize to TOML");
        let parsed = AnalysisParameters::from_toml(&text).expect("parse TOML");
        assert_eq!(parsed, params);
        assert_eq!(parsed.norm_profile(), NormProfile::Circular);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = AnalysisParameters::from_file("params.yaml").unwrap_err();
        assert!(matches!(err, GrainError::UnsupportedFileFormat));
    }

    #[test]
    fn schema_lists_parameters() {
        let schema = serde_json::to_value(AnalysisParameters::schema()).expect("schema to JSON");
        let properties = schema["properties"].as_object().expect("object schema");
        assert!(properties.contains_key("adaptive_block_size"));
        assert!(properties.contains_key("motifs"));
    }
}
