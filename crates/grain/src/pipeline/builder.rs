use crate::{
    algorithms::{BoundaryExtractor, ZhangSuenThinner},
    config::AnalysisParameters,
    error::Result,
    pipeline::Pipeline,
    traits::{ImagePreprocessor, SkeletonThinner},
};

/// Builder for creating measurement pipelines with a fluent API
pub struct PipelineBuilder {
    params: AnalysisParameters,
    extra_preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    thinner: Option<Box<dyn SkeletonThinner>>,
}

impl PipelineBuilder {
    /// Create a builder with default parameters
    pub fn new() -> Self {
        Self {
            params: AnalysisParameters::default(),
            extra_preprocessors: Vec::new(),
            thinner: None,
        }
    }

    /// Replace the parameter set
    pub fn params(mut self, params: AnalysisParameters) -> Self {
        self.params = params;
        self
    }

    /// Append a step after the standard boundary extraction chain
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.extra_preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Set the thinning algorithm (replaces any existing one)
    pub fn set_thinner<T>(mut self, thinner: T) -> Self
    where
        T: SkeletonThinner + 'static,
    {
        self.thinner = Some(Box::new(thinner));
        self
    }

    /// Validate the parameters and assemble the pipeline
    pub fn build(self) -> Result<Pipeline> {
        self.params.validate()?;

        let mut extractor = BoundaryExtractor::from_params(&self.params);
        for step in self.extra_preprocessors {
            extractor.push(step);
        }
        let thinner = self.thinner.unwrap_or_else(|| Box::new(ZhangSuenThinner));

        Ok(Pipeline::new(extractor, thinner, self.params))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
