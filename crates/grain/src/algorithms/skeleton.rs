//! Thinning of boundary masks and boundary width estimation.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use tracing::debug;

use crate::{algorithms::preprocessing::FOREGROUND, error::Result, traits::SkeletonThinner};

/// Neighbour offsets in ring order: N, NE, E, SE, S, SW, W, NW
pub(crate) const RING: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Dense boolean view of a mask, out-of-bounds reads are background
struct BitGrid {
    width: i64,
    height: i64,
    bits: Vec<bool>,
}

impl BitGrid {
    fn from_mask(mask: &GrayImage) -> Self {
        Self {
            width: mask.width() as i64,
            height: mask.height() as i64,
            bits: mask.pixels().map(|p| p[0] > 0).collect(),
        }
    }

    fn get(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    fn clear(&mut self, x: i64, y: i64) {
        self.bits[(y * self.width + x) as usize] = false;
    }

    fn ring(&self, x: i64, y: i64) -> [bool; 8] {
        RING.map(|(dx, dy)| self.get(x + dx, y + dy))
    }

    fn to_mask(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width as u32, self.height as u32);
        for (i, &set) in self.bits.iter().enumerate() {
            if set {
                let x = (i as i64 % self.width) as u32;
                let y = (i as i64 / self.width) as u32;
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        out
    }
}

/// Number of 0 -> 1 transitions around the ring
fn transitions(ring: &[bool; 8]) -> usize {
    (0..8).filter(|&i| !ring[i] && ring[(i + 1) % 8]).count()
}

/// Whether two ring positions touch each other
fn ring_adjacent(a: usize, b: usize) -> bool {
    let gap = (a + 8 - b) % 8;
    // consecutive positions always touch, edge neighbours two apart touch through the corner
    gap == 1 || gap == 7 || ((gap == 2 || gap == 6) && a % 2 == 0 && b % 2 == 0)
}

/// Whether clearing the centre of this ring keeps the local topology
fn is_simple(ring: &[bool; 8]) -> bool {
    let mut label = [usize::MAX; 8];
    let mut components = 0;
    for start in 0..8 {
        if !ring[start] || label[start] != usize::MAX {
            continue;
        }
        let mut stack = vec![start];
        label[start] = components;
        while let Some(i) = stack.pop() {
            for j in 0..8 {
                if ring[j] && label[j] == usize::MAX && ring_adjacent(i, j) {
                    label[j] = components;
                    stack.push(j);
                }
            }
        }
        components += 1;
    }
    if components != 1 {
        return false;
    }

    // background runs touching an edge neighbour
    let mut touching_runs = 0;
    let mut seen = [false; 8];
    for start in 0..8 {
        if ring[start] || seen[start] {
            continue;
        }
        let mut run = vec![start];
        seen[start] = true;
        let mut k = 0;
        while k < run.len() {
            let i = run[k];
            for j in [(i + 1) % 8, (i + 7) % 8] {
                if !ring[j] && !seen[j] {
                    seen[j] = true;
                    run.push(j);
                }
            }
            k += 1;
        }
        if run.iter().any(|&i| i % 2 == 0) {
            touching_runs += 1;
        }
    }
    touching_runs == 1
}

/// Zhang-Suen thinning followed by removal of redundant staircase pixels.
///
/// The cleanup pass clears every pixel that has at least two skeleton
/// neighbours and whose removal keeps both the foreground and the background
/// locally connected, so diagonal steps collapse to single-pixel lines and
/// endpoints are never eaten.
#[derive(Debug, Clone, Default)]
pub struct ZhangSuenThinner;

impl ZhangSuenThinner {
    fn zhang_suen(grid: &mut BitGrid) -> usize {
        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut changed = false;
            for step in 0..2 {
                let mut marked = Vec::new();
                for y in 0..grid.height {
                    for x in 0..grid.width {
                        if !grid.get(x, y) {
                            continue;
                        }
                        let ring = grid.ring(x, y);
                        let neighbours = ring.iter().filter(|&&b| b).count();
                        if !(2..=6).contains(&neighbours) || transitions(&ring) != 1 {
                            continue;
                        }
                        let (n, e, s, w) = (ring[0], ring[2], ring[4], ring[6]);
                        let keep = if step == 0 {
                            (n && e && s) || (e && s && w)
                        } else {
                            (n && e && w) || (n && s && w)
                        };
                        if !keep {
                            marked.push((x, y));
                        }
                    }
                }
                changed |= !marked.is_empty();
                for (x, y) in marked {
                    grid.clear(x, y);
                }
            }
            if !changed {
                return iterations;
            }
        }
    }

    fn remove_redundant(grid: &mut BitGrid) -> usize {
        let mut removed = 0;
        loop {
            let mut changed = false;
            for y in 0..grid.height {
                for x in 0..grid.width {
                    if !grid.get(x, y) {
                        continue;
                    }
                    let ring = grid.ring(x, y);
                    if ring.iter().filter(|&&b| b).count() >= 2 && is_simple(&ring) {
                        grid.clear(x, y);
                        removed += 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                return removed;
            }
        }
    }
}

impl SkeletonThinner for ZhangSuenThinner {
    fn thin(&self, mask: &GrayImage) -> Result<GrayImage> {
        let mut grid = BitGrid::from_mask(mask);
        let iterations = Self::zhang_suen(&mut grid);
        let redundant = Self::remove_redundant(&mut grid);
        debug!(iterations, redundant, "skeleton thinning");
        Ok(grid.to_mask())
    }
}

/// Median full width of the boundaries, in pixels.
///
/// Every boundary pixel gets its distance to the nearest background pixel;
/// sampling that field on the skeleton gives the half width of the boundary
/// the skeleton runs through. Degenerate inputs (empty mask, mask with no
/// background, empty skeleton) yield 1.0.
pub fn estimate_border_width(mask: &GrayImage, skeleton: &GrayImage) -> f64 {
    let has_foreground = mask.pixels().any(|p| p[0] > 0);
    let has_background = mask.pixels().any(|p| p[0] == 0);
    if !has_foreground || !has_background {
        return 1.0;
    }

    let mut inverted = mask.clone();
    for pixel in inverted.pixels_mut() {
        pixel[0] = if pixel[0] > 0 { 0 } else { FOREGROUND };
    }
    let distance_sq = euclidean_squared_distance_transform(&inverted);

    let mut widths: Vec<f64> = skeleton
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| 2.0 * distance_sq.get_pixel(x, y)[0].sqrt())
        .collect();
    if widths.is_empty() {
        return 1.0;
    }

    widths.sort_by(|a, b| a.total_cmp(b));
    let mid = widths.len() / 2;
    let median = if widths.len() % 2 == 0 {
        (widths[mid - 1] + widths[mid]) / 2.0
    } else {
        widths[mid]
    };
    median.max(1.0)
}
