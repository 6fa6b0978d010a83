//! Synthetic measurement curves laid over the micrograph.

use geo_types::LineString;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{GrainError, Result},
    types::{polyline_length, to_line_string, Point},
};

/// Segments used to approximate each circle
pub const CIRCLE_SEGMENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotifKind {
    Linear,
    Circular,
}

/// How the motifs of a run are generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotifParams {
    /// Randomly placed straight segments
    Linear {
        #[serde(default = "default_linear_count")]
        count: usize,
        /// Segment length before clipping, defaults to 80% of the shorter image side
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length_px: Option<f64>,
        /// Candidate orientations in degrees
        #[serde(default = "default_orientations")]
        orientations: Vec<f64>,
    },
    /// Concentric circles around the image centre
    Circular {
        #[serde(default = "default_circular_count")]
        count: usize,
    },
}

fn default_linear_count() -> usize {
    10
}

fn default_circular_count() -> usize {
    3
}

fn default_orientations() -> Vec<f64> {
    vec![0.0, 45.0, 90.0, 135.0]
}

impl Default for MotifParams {
    fn default() -> Self {
        MotifParams::Circular {
            count: default_circular_count(),
        }
    }
}

impl MotifParams {
    pub fn kind(&self) -> MotifKind {
        match self {
            MotifParams::Linear { .. } => MotifKind::Linear,
            MotifParams::Circular { .. } => MotifKind::Circular,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let MotifParams::Linear { length_px, orientations, .. } = self {
            if let Some(length) = length_px {
                if !length.is_finite() || *length <= 0.0 {
                    return Err(GrainError::InvalidParameters(format!(
                        "motifs.length_px must be a positive number, got {length}"
                    )));
                }
            }
            if orientations.is_empty() {
                return Err(GrainError::InvalidParameters(
                    "motifs.orientations must not be empty".to_string(),
                ));
            }
            if orientations.iter().any(|o| !o.is_finite()) {
                return Err(GrainError::InvalidParameters(
                    "motifs.orientations must be finite angles".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One measurement curve in pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motif {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MotifKind,
    pub points: Vec<Point>,
    pub length_px: f64,
}

impl Motif {
    fn new(id: String, kind: MotifKind, points: Vec<Point>) -> Self {
        let length_px = polyline_length(&points);
        Self { id, kind, points, length_px }
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        to_line_string(&self.points)
    }
}

/// Generate the motifs for an image of `width` x `height` pixels.
///
/// The generator is seeded per call, so equal inputs give equal motifs.
pub fn generate_motifs(width: u32, height: u32, params: &MotifParams, seed: u64) -> Vec<Motif> {
    let mut rng = StdRng::seed_from_u64(seed);
    let motifs = match params {
        MotifParams::Linear { count, length_px, orientations } => {
            linear_motifs(width, height, *count, *length_px, orientations, &mut rng)
        }
        MotifParams::Circular { count } => circular_motifs(width, height, *count),
    };
    debug!(kind = ?params.kind(), requested = ?params, generated = motifs.len(), "motifs generated");
    motifs
}

fn linear_motifs(
    width: u32,
    height: u32,
    count: usize,
    length_px: Option<f64>,
    orientations: &[f64],
    rng: &mut StdRng,
) -> Vec<Motif> {
    let (w, h) = (width as f64, height as f64);
    let length = length_px.unwrap_or(w.min(h) * 0.8);
    let (low_x, high_x) = (w * 0.1, w - w * 0.1);
    let (low_y, high_y) = (h * 0.1, h - h * 0.1);

    let mut motifs = Vec::new();
    for i in 0..count {
        let Some(&angle) = orientations.choose(rng) else {
            break;
        };
        let (cx, cy) = if low_x >= high_x || low_y >= high_y {
            (w / 2.0, h / 2.0)
        } else {
            (rng.gen_range(low_x..high_x), rng.gen_range(low_y..high_y))
        };

        let (sin, cos) = angle.to_radians().sin_cos();
        let (dx, dy) = (length / 2.0 * cos, length / 2.0 * sin);
        let Some((start, end)) = clip_segment([cx - dx, cy - dy], [cx + dx, cy + dy], w, h) else {
            continue;
        };
        if start == end {
            continue;
        }
        motifs.push(Motif::new(format!("L-{i}"), MotifKind::Linear, vec![start, end]));
    }
    motifs
}

fn circular_motifs(width: u32, height: u32, count: usize) -> Vec<Motif> {
    let (w, h) = (width as f64, height as f64);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let max_radius = w.min(h) / 2.0 * 0.95;
    if count == 0 {
        return Vec::new();
    }

    let first = max_radius / count as f64;
    let step = if count > 1 { (max_radius - first) / (count - 1) as f64 } else { 0.0 };
    (0..count)
        .map(|i| if count > 1 { first + step * i as f64 } else { max_radius })
        .enumerate()
        .filter(|(_, r)| *r > 0.0)
        .map(|(i, r)| {
            let points = (0..=CIRCLE_SEGMENTS)
                .map(|k| {
                    let t = std::f64::consts::TAU * (k % CIRCLE_SEGMENTS) as f64 / CIRCLE_SEGMENTS as f64;
                    [cx + r * t.cos(), cy + r * t.sin()]
                })
                .collect();
            Motif::new(format!("C-{i}"), MotifKind::Circular, points)
        })
        .collect()
}

/// Liang-Barsky clipping of a segment to `[0, w] x [0, h]`
fn clip_segment(p0: Point, p1: Point, w: f64, h: f64) -> Option<(Point, Point)> {
    let (dx, dy) = (p1[0] - p0[0], p1[1] - p0[1]);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [(-dx, p0[0]), (dx, w - p0[0]), (-dy, p0[1]), (dy, h - p0[1])] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        [p0[0] + t0 * dx, p0[1] + t0 * dy],
        [p0[0] + t1 * dx, p0[1] + t1 * dy],
    ))
}
