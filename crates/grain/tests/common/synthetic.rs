//! Synthetic micrographs: dark boundaries on a light background.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const BACKGROUND: Luma<u8> = Luma([225]);
pub const BOUNDARY: Luma<u8> = Luma([25]);

/// Stroke from `a` to `b` with round caps
pub fn draw_stroke(image: &mut GrayImage, a: (f32, f32), b: (f32, f32), radius: i32) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let steps = dx.hypot(dy).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let centre = ((a.0 + t * dx).round() as i32, (a.1 + t * dy).round() as i32);
        draw_filled_circle_mut(image, centre, radius, BOUNDARY);
    }
}

/// Three thick arms meeting at the image centre
pub fn y_junction(size: u32) -> DynamicImage {
    let mut image = GrayImage::from_pixel(size, size, BACKGROUND);
    let s = size as f32;
    let centre = (s / 2.0, s / 2.0);
    draw_stroke(&mut image, centre, (s / 2.0, s * 0.1), 2);
    draw_stroke(&mut image, centre, (s * 0.15, s * 0.75), 2);
    draw_stroke(&mut image, centre, (s * 0.85, s * 0.75), 2);
    DynamicImage::ImageLuma8(image)
}

/// Square grid of bars `thickness` pixels wide every `spacing` pixels
pub fn grid(size: u32, spacing: u32, thickness: u32) -> DynamicImage {
    let mut image = GrayImage::from_pixel(size, size, BACKGROUND);
    for k in (spacing / 2..size).step_by(spacing as usize) {
        draw_filled_rect_mut(&mut image, Rect::at(k as i32, 0).of_size(thickness, size), BOUNDARY);
        draw_filled_rect_mut(&mut image, Rect::at(0, k as i32).of_size(size, thickness), BOUNDARY);
    }
    DynamicImage::ImageLuma8(image)
}

/// Voronoi cell walls around jittered seeds, one seed per `cell` square
pub fn voronoi(size: u32, cell: u32, wall: f32, seed: u64) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let per_side = size / cell;
    let jitter = cell as f32 * 0.3;
    let seeds: Vec<(f32, f32)> = (0..per_side)
        .flat_map(|j| (0..per_side).map(move |i| (i, j)))
        .map(|(i, j)| {
            let cx = (i as f32 + 0.5) * cell as f32;
            let cy = (j as f32 + 0.5) * cell as f32;
            (cx + rng.gen_range(-jitter..jitter), cy + rng.gen_range(-jitter..jitter))
        })
        .collect();

    let image = GrayImage::from_fn(size, size, |x, y| {
        let (px, py) = (x as f32, y as f32);
        let (mut first, mut second) = (f32::MAX, f32::MAX);
        for &(sx, sy) in &seeds {
            let d = (sx - px).hypot(sy - py);
            if d < first {
                second = first;
                first = d;
            } else if d < second {
                second = d;
            }
        }
        if second - first < wall { BOUNDARY } else { BACKGROUND }
    });
    DynamicImage::ImageLuma8(image)
}
