use grain::{overlay, Analysis, AnalysisParameters, GrainError};

use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    GrainError(#[from] GrainError),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Missing 'image' field")]
    MissingImage,
    #[error("Pixel size must be a positive number of micrometres, got {0}")]
    InvalidPixelSize(f64),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One micrograph to analyse, as written in a job file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisJob {
    /// Path to the micrograph
    pub image: String,
    /// Physical size of one pixel in micrometres
    pub pixel_size_um: f64,
    pub output_dir: String,
    /// Full parameter file (.toml or .json) used instead of the defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_file: Option<String>,
    /// Partial parameter object applied last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl AnalysisJob {
    /// Load AnalysisJob from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load AnalysisJob from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let job: AnalysisJob = toml::from_str(content)?;
        job.validate()?;
        Ok(job)
    }

    /// Load AnalysisJob from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load AnalysisJob from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let job: AnalysisJob = serde_json::from_str(content)?;
        job.validate()?;
        Ok(job)
    }

    /// Auto-detect file format and load the job
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    pub fn validate(&self) -> Result<(), CliError> {
        if self.image.trim().is_empty() {
            return Err(CliError::MissingImage);
        }
        if !self.pixel_size_um.is_finite() || self.pixel_size_um <= 0.0 {
            return Err(CliError::InvalidPixelSize(self.pixel_size_um));
        }
        Ok(())
    }

    /// Parameters for this job: the parameter file or the defaults, then the inline overrides
    pub fn parameters(&self) -> Result<AnalysisParameters, CliError> {
        resolve_parameters(self.params_file.as_deref().map(Path::new), self.params.as_ref())
    }

    /// Convert AnalysisJob to TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert AnalysisJob to JSON string
    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

/// Parameter file (or defaults) with optional JSON overrides on top
pub fn resolve_parameters(
    params_file: Option<&Path>,
    overrides: Option<&serde_json::Value>,
) -> Result<AnalysisParameters, CliError> {
    let base = match params_file {
        Some(path) => AnalysisParameters::from_file(path)?,
        None => AnalysisParameters::default(),
    };
    let params = match overrides {
        Some(value) => base.with_overrides(value)?,
        None => base,
    };
    params.validate()?;
    Ok(params)
}

/// Files written for one analysis
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub result_json: PathBuf,
    pub result_geojson: PathBuf,
    pub annotated: PathBuf,
    pub skeleton: PathBuf,
    pub motifs: PathBuf,
    pub mask: PathBuf,
}

impl OutputFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            result_json: dir.join("result.json"),
            result_geojson: dir.join("result.geojson"),
            annotated: dir.join("annotated.png"),
            skeleton: dir.join("skeleton.png"),
            motifs: dir.join("motifs.png"),
            mask: dir.join("mask.png"),
        }
    }
}

/// Write the report, its GeoJSON and the overlay images into `output_dir`
pub fn write_outputs(
    analysis: &Analysis,
    image: &DynamicImage,
    output_dir: &Path,
) -> Result<OutputFiles, CliError> {
    fs::create_dir_all(output_dir)?;
    let files = OutputFiles::in_dir(output_dir);

    fs::write(&files.result_json, analysis.result.to_json_string()?)?;
    analysis.result.save_geojson(&files.result_geojson)?;

    overlay::annotated_overlay(image, analysis).save(&files.annotated)?;
    overlay::skeleton_overlay(image, analysis.artifacts.skeleton()).save(&files.skeleton)?;
    overlay::motif_overlay(image, analysis.artifacts.motifs()).save(&files.motifs)?;
    analysis.artifacts.mask().save(&files.mask)?;

    info!("Wrote analysis outputs to {}", output_dir.display());
    Ok(files)
}
