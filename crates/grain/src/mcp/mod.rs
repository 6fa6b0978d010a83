use crate::{
    config::AnalysisParameters,
    error::{GrainError, Result as GrainResult},
    intersections::NormProfile,
    pipeline::Pipeline,
    types::AnalysisResult,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use rmcp::{
    handler::server::tool::IntoCallToolResult, model::{CallToolResult, Content, ServerCapabilities, ServerInfo}, schemars, tool, Error as McpError, ServerHandler
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use std::io::Cursor;
use std::sync::Arc;

/// Request to analyse one micrograph
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnalyzeImageRequest {
    #[schemars(description = "Path to the micrograph image file")]
    pub path: String,
    #[schemars(description = "Physical size of one pixel in micrometres")]
    pub pixel_size_um: f64,
    #[schemars(description = "Partial parameter object overriding the defaults (see get_parameter_schema)")]
    pub params: Option<serde_json::Value>,
}

/// Request to preview the boundary mask
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PreviewRequest {
    #[schemars(description = "Path to the micrograph image file")]
    pub path: String,
    #[schemars(description = "Partial parameter object overriding the defaults")]
    pub params: Option<serde_json::Value>,
}

/// Response containing the grain size analysis
#[derive(Debug, Serialize, schemars::JsonSchema, TS)]
#[ts(export)]
pub struct AnalysisResponse {
    #[schemars(description = "ASTM grain size number")]
    pub grain_size_g: f64,
    #[schemars(description = "Mean intercept length in micrometres")]
    pub mean_intercept_um: f64,
    #[schemars(description = "Weighted intersection count")]
    pub weighted_intersections: f64,
    #[schemars(description = "Number of intersection clusters")]
    pub intersections_count: usize,
    pub image_dimensions: ImageDimensions,
    pub warnings: Vec<String>,
    #[schemars(description = "Complete analysis result")]
    pub result: serde_json::Value,
    #[schemars(description = "GeoJSON representation of edges, motifs and intersections")]
    pub geojson: serde_json::Value,
}

#[derive(Debug, Serialize, schemars::JsonSchema, TS)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl IntoCallToolResult for AnalysisResponse {
    fn into_call_tool_result(self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&self).unwrap_or_else(|_| format!("{:?}", self)),
        )]))
    }
}

impl AnalysisResponse {
    fn error(message: String) -> Self {
        Self {
            grain_size_g: 0.0,
            mean_intercept_um: 0.0,
            weighted_intersections: 0.0,
            intersections_count: 0,
            image_dimensions: ImageDimensions { width: 0, height: 0 },
            warnings: vec![message.clone()],
            result: serde_json::json!({ "error": message }),
            geojson: serde_json::Value::Null,
        }
    }

    fn from_result(result: &AnalysisResult) -> GrainResult<Self> {
        let typed_geojson = result.to_typed_geojson()?;
        Ok(Self {
            grain_size_g: result.metrics.g,
            mean_intercept_um: result.metrics.ell_um,
            weighted_intersections: result.metrics.n_int,
            intersections_count: result.intersections.len(),
            image_dimensions: ImageDimensions {
                width: result.image_width,
                height: result.image_height,
            },
            warnings: result.warnings.clone(),
            result: serde_json::to_value(result)?,
            geojson: serde_json::to_value(typed_geojson)?,
        })
    }
}

/// MCP Server for grain size measurement. Every call loads its own image.
#[derive(Clone)]
pub struct GrainMcpServer {
    defaults: Arc<AnalysisParameters>,
}

impl GrainMcpServer {
    pub fn new() -> Self {
        Self::with_defaults(AnalysisParameters::default())
    }

    /// Server whose overrides apply on top of `defaults`
    pub fn with_defaults(defaults: AnalysisParameters) -> Self {
        Self { defaults: Arc::new(defaults) }
    }

    fn pipeline(&self, overrides: Option<&serde_json::Value>) -> GrainResult<Pipeline> {
        let params = match overrides {
            Some(value) if !value.is_null() => self.defaults.with_overrides(value)?,
            _ => (*self.defaults).clone(),
        };
        Pipeline::from_params(params)
    }

    pub fn analyze(&self, path: &str, pixel_size_um: f64, overrides: Option<&serde_json::Value>) -> GrainResult<AnalysisResponse> {
        if !pixel_size_um.is_finite() || pixel_size_um <= 0.0 {
            return Err(GrainError::InvalidPixelSize(pixel_size_um));
        }
        let pipeline = self.pipeline(overrides)?;
        let image = image::open(path)?;
        let analysis = pipeline.run(&image, pixel_size_um)?;
        AnalysisResponse::from_result(&analysis.result)
    }

    /// Boundary mask of the image as a PNG data URI
    pub fn preview(&self, path: &str, overrides: Option<&serde_json::Value>) -> GrainResult<String> {
        let pipeline = self.pipeline(overrides)?;
        let image = image::open(path)?;
        let mask = pipeline.preprocess(&image)?;

        let mut png = Vec::new();
        mask.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

impl Default for GrainMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool(tool_box)]
impl GrainMcpServer {
    #[tool(description = "Measure the ASTM grain size of a micrograph by the intercept method")]
    fn analyze_image(
        &self,
        #[tool(aggr)] AnalyzeImageRequest { path, pixel_size_um, params }: AnalyzeImageRequest,
    ) -> AnalysisResponse {
        match self.analyze(&path, pixel_size_um, params.as_ref()) {
            Ok(response) => response,
            Err(e) => AnalysisResponse::error(format!("Analysis of {} failed: {}", path, e)),
        }
    }

    #[tool(description = "Extract the binary grain boundary mask and return it as a base64 PNG data URI")]
    fn preprocess_preview(&self, #[tool(aggr)] PreviewRequest { path, params }: PreviewRequest) -> String {
        match self.preview(&path, params.as_ref()) {
            Ok(uri) => uri,
            Err(e) => format!("Preprocessing of {} failed: {}", path, e),
        }
    }

    #[tool(description = "Get the JSON schema of the analysis parameters")]
    fn get_parameter_schema(&self) -> String {
        serde_json::to_string_pretty(&AnalysisParameters::schema())
            .unwrap_or_else(|e| format!("Failed to serialize schema: {}", e))
    }

    #[tool(description = "List the built-in intersection scoring profiles and their weights")]
    fn list_norm_profiles(&self) -> String {
        let profiles: Vec<serde_json::Value> = NormProfile::catalogue()
            .into_iter()
            .map(|(profile, weights)| serde_json::json!({ "name": profile.to_string(), "weights": weights }))
            .collect();
        serde_json::to_string_pretty(&profiles)
            .unwrap_or_else(|e| format!("Failed to serialize profiles: {}", e))
    }
}

#[tool(tool_box)]
impl ServerHandler for GrainMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Grain Size Measurement Server - Analyse metallographic micrographs: boundary extraction, skeleton graph, synthetic line or circle motifs and ASTM grain size number from weighted intercept counts.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
