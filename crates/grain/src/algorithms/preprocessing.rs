use image::{DynamicImage, GrayImage, Luma};
use imageproc::{
    distance_transform::Norm,
    drawing::draw_line_segment_mut,
    hough::{detect_lines, LineDetectionOptions, PolarLine},
    region_labelling::{connected_components, Connectivity},
};
use tracing::debug;

use crate::{
    config::AnalysisParameters,
    error::{GrainError, Result},
    traits::ImagePreprocessor,
};

/// Foreground value of every binary mask produced here
pub const FOREGROUND: u8 = 255;

/// Convert any decoded image to single-channel intensity
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

/// Gaussian blur preprocessor for noise reduction
#[derive(Debug, Clone)]
pub struct GaussianBlurPreprocessor {
    pub sigma: f32,
}

impl Default for GaussianBlurPreprocessor {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl ImagePreprocessor for GaussianBlurPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        // imageproc panics on a non-positive sigma
        if self.sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::filter::gaussian_blur_f32(image, self.sigma))
    }

    fn name(&self) -> &'static str {
        "gaussian_blur"
    }
}

/// Local threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel becomes foreground when its intensity is at or below
/// `local_mean - offset`, so dark boundaries on a bright background end up as
/// 255 in the output. The neighbourhood weight uses `sigma = (block_size - 1) / 6`.
#[derive(Debug, Clone)]
pub struct AdaptiveThresholdPreprocessor {
    pub block_size: u32,
    pub offset: f64,
}

impl Default for AdaptiveThresholdPreprocessor {
    fn default() -> Self {
        Self {
            block_size: 101,
            offset: 10.0,
        }
    }
}

impl AdaptiveThresholdPreprocessor {
    fn sigma(&self) -> f32 {
        (self.block_size as f32 - 1.0) / 6.0
    }
}

impl ImagePreprocessor for AdaptiveThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.block_size <= 1 || self.block_size % 2 == 0 {
            return Err(GrainError::ImageProcessing(format!(
                "adaptive threshold block size must be odd and greater than 1, got {}",
                self.block_size
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Ok(image.clone());
        }

        let local_mean = imageproc::filter::gaussian_blur_f32(image, self.sigma());
        let mut binary = GrayImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let threshold = local_mean.get_pixel(x, y)[0] as f64 - self.offset;
            if pixel[0] as f64 <= threshold {
                binary.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        Ok(binary)
    }

    fn name(&self) -> &'static str {
        "adaptive_threshold"
    }
}

/// Morphological opening (erosion then dilation) with a square kernel.
///
/// The kernel is the `Norm::LInf` ball of radius `kernel_size / 2`, which is
/// exactly the square of side `kernel_size` for odd sizes; even sizes round up.
#[derive(Debug, Clone)]
pub struct MorphologicalOpening {
    pub kernel_size: i32,
}

impl ImagePreprocessor for MorphologicalOpening {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.kernel_size <= 0 {
            return Ok(image.clone());
        }
        let radius = (self.kernel_size / 2).min(u8::MAX as i32) as u8;
        if radius == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::morphology::open(image, Norm::LInf, radius))
    }

    fn name(&self) -> &'static str {
        "morphological_opening"
    }
}

/// Drops 4-connected foreground components smaller than `min_size` pixels.
///
/// Pixels touching only at a corner belong to different components.
#[derive(Debug, Clone)]
pub struct AreaOpening {
    pub min_size: i64,
}

impl ImagePreprocessor for AreaOpening {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.min_size <= 0 {
            return Ok(image.clone());
        }

        let labels = connected_components(image, Connectivity::Four, Luma([0u8]));
        let label_count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut sizes = vec![0i64; label_count + 1];
        for label in labels.pixels() {
            sizes[label[0] as usize] += 1;
        }

        let mut kept = GrayImage::new(image.width(), image.height());
        let mut removed = 0usize;
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if sizes[label] >= self.min_size {
                kept.put_pixel(x, y, Luma([FOREGROUND]));
            } else {
                removed += 1;
            }
        }
        debug!(components = label_count, removed_px = removed, "area opening");
        Ok(kept)
    }

    fn name(&self) -> &'static str {
        "area_opening"
    }
}

/// Best-effort removal of long straight lines such as annealing twins.
///
/// Lines found by the Hough transform are walked across the mask and split
/// into foreground runs; runs of at least `min_line_length` pixels (bridging
/// gaps up to `max_line_gap`) are erased with a `thickness` pixel wide stroke.
/// Real boundaries that happen to be straight are erased too and the mask may
/// be left with gaps.
#[derive(Debug, Clone)]
pub struct TwinLineRemoval {
    pub vote_threshold: u32,
    pub suppression_radius: u32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    pub thickness: u32,
}

impl Default for TwinLineRemoval {
    fn default() -> Self {
        Self {
            vote_threshold: 100,
            suppression_radius: 8,
            min_line_length: 100.0,
            max_line_gap: 10.0,
            thickness: 2,
        }
    }
}

impl TwinLineRemoval {
    /// Foreground runs along a Hough line, as segment end points
    fn segments_along(&self, image: &GrayImage, line: &PolarLine) -> Vec<((f32, f32), (f32, f32))> {
        let theta = (line.angle_in_degrees as f64).to_radians();
        let (sin, cos) = theta.sin_cos();
        let (x0, y0) = (line.r as f64 * cos, line.r as f64 * sin);
        let (dx, dy) = (-sin, cos);
        let reach = ((image.width() as f64).powi(2) + (image.height() as f64).powi(2)).sqrt();

        let mut segments = Vec::new();
        let mut run: Option<(f64, f64)> = None;
        let mut last_hit = f64::NEG_INFINITY;
        let mut t = -reach;
        while t <= reach {
            let x = (x0 + t * dx).round();
            let y = (y0 + t * dy).round();
            let inside = x >= 0.0 && y >= 0.0 && x < image.width() as f64 && y < image.height() as f64;
            let hit = inside && image.get_pixel(x as u32, y as u32)[0] > 0;

            if hit {
                run = match run {
                    Some((start, _)) if t - last_hit <= self.max_line_gap => Some((start, t)),
                    Some(finished) => {
                        self.push_run(&mut segments, finished, (x0, y0), (dx, dy));
                        Some((t, t))
                    }
                    None => Some((t, t)),
                };
                last_hit = t;
            }
            t += 1.0;
        }
        if let Some(finished) = run {
            self.push_run(&mut segments, finished, (x0, y0), (dx, dy));
        }
        segments
    }

    fn push_run(
        &self,
        segments: &mut Vec<((f32, f32), (f32, f32))>,
        (start, end): (f64, f64),
        (x0, y0): (f64, f64),
        (dx, dy): (f64, f64),
    ) {
        if end - start < self.min_line_length {
            return;
        }
        segments.push((
            ((x0 + start * dx) as f32, (y0 + start * dy) as f32),
            ((x0 + end * dx) as f32, (y0 + end * dy) as f32),
        ));
    }
}

impl ImagePreprocessor for TwinLineRemoval {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        let lines = detect_lines(
            image,
            LineDetectionOptions {
                vote_threshold: self.vote_threshold,
                suppression_radius: self.suppression_radius,
            },
        );
        if lines.is_empty() {
            return Ok(image.clone());
        }

        let mut twin_mask = GrayImage::new(image.width(), image.height());
        let mut segment_count = 0usize;
        for line in &lines {
            let theta = (line.angle_in_degrees as f32).to_radians();
            let (nx, ny) = (theta.cos(), theta.sin());
            for (start, end) in self.segments_along(image, line) {
                segment_count += 1;
                for k in 0..self.thickness.max(1) {
                    let off = k as f32 - (self.thickness.max(1) - 1) as f32 / 2.0;
                    draw_line_segment_mut(
                        &mut twin_mask,
                        (start.0 + off * nx, start.1 + off * ny),
                        (end.0 + off * nx, end.1 + off * ny),
                        Luma([FOREGROUND]),
                    );
                }
            }
        }
        debug!(lines = lines.len(), segments = segment_count, "twin line removal");

        let mut result = image.clone();
        for (x, y, pixel) in result.enumerate_pixels_mut() {
            if twin_mask.get_pixel(x, y)[0] > 0 {
                pixel[0] = 0;
            }
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "twin_line_removal"
    }
}

/// Ordered chain of preprocessing steps turning a micrograph into a boundary mask
pub struct BoundaryExtractor {
    steps: Vec<Box<dyn ImagePreprocessor>>,
}

impl BoundaryExtractor {
    /// Create an extractor from an explicit list of steps
    pub fn new(steps: Vec<Box<dyn ImagePreprocessor>>) -> Self {
        Self { steps }
    }

    /// Standard chain: blur, adaptive threshold, opening, area opening, optional twin removal
    pub fn from_params(params: &AnalysisParameters) -> Self {
        let mut steps: Vec<Box<dyn ImagePreprocessor>> = vec![
            Box::new(GaussianBlurPreprocessor { sigma: params.gaussian_sigma }),
            Box::new(AdaptiveThresholdPreprocessor {
                block_size: params.adaptive_block_size,
                offset: params.adaptive_offset,
            }),
            Box::new(MorphologicalOpening { kernel_size: params.morph_open_kernel }),
            Box::new(AreaOpening { min_size: params.area_opening_min_size_px }),
        ];
        if params.detect_twins {
            steps.push(Box::new(TwinLineRemoval::default()));
        }
        Self { steps }
    }

    /// Append an extra step after the existing ones
    pub fn push(&mut self, step: Box<dyn ImagePreprocessor>) {
        self.steps.push(step);
    }

    /// Names of the configured steps, in order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on a grayscale image
    pub fn extract_gray(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut current = image.clone();
        for step in &self.steps {
            current = step.preprocess(&current)?;
            debug!(
                step = step.name(),
                foreground_px = current.pixels().filter(|p| p[0] > 0).count(),
                "boundary extraction step"
            );
        }
        Ok(current)
    }

    /// Convert to intensity, then run every step
    pub fn extract(&self, image: &DynamicImage) -> Result<GrayImage> {
        self.extract_gray(&to_grayscale(image))
    }
}
