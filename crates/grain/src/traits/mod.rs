use image::GrayImage;
use crate::error::Result;

/// Trait for a single boundary extraction step (blur, threshold, cleanup)
pub trait ImagePreprocessor: Send + Sync {
    /// Transform the image produced by the previous step
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;

    /// Short human readable name used in logs and pipeline summaries
    fn name(&self) -> &'static str;
}

/// Trait for topology-preserving thinning algorithms
pub trait SkeletonThinner: Send + Sync {
    /// Reduce a binary boundary mask (non-zero = boundary) to a one pixel wide skeleton.
    /// The output has the same dimensions and uses 255 for skeleton pixels.
    fn thin(&self, mask: &GrayImage) -> Result<GrayImage>;
}
