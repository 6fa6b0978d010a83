//! Colour overlays of the analysis on top of the micrograph.

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::{
    graph::{BoundaryGraph, NodeKind},
    intersections::{Intersection, IntersectionKind},
    motifs::Motif,
    pipeline::Analysis,
    types::Point,
};

pub const SKELETON_COLOR: Rgb<u8> = Rgb([0, 220, 0]);
pub const MOTIF_COLOR: Rgb<u8> = Rgb([40, 90, 255]);
pub const JUNCTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const REGULAR_COLOR: Rgb<u8> = Rgb([255, 220, 0]);
pub const ENDPOINT_COLOR: Rgb<u8> = Rgb([0, 230, 230]);

pub fn intersection_color(kind: IntersectionKind) -> Rgb<u8> {
    match kind {
        IntersectionKind::Junction => JUNCTION_COLOR,
        IntersectionKind::Regular => REGULAR_COLOR,
        IntersectionKind::Endpoint => ENDPOINT_COLOR,
    }
}

fn base(image: &DynamicImage) -> RgbImage {
    DynamicImage::ImageLuma8(image.to_luma8()).to_rgb8()
}

fn draw_polyline(canvas: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    for w in points.windows(2) {
        draw_line_segment_mut(
            canvas,
            (w[0][0] as f32, w[0][1] as f32),
            (w[1][0] as f32, w[1][1] as f32),
            color,
        );
    }
}

fn draw_graph(canvas: &mut RgbImage, graph: &BoundaryGraph) {
    for edge in graph.edges() {
        draw_polyline(canvas, &edge.polyline, SKELETON_COLOR);
    }
    for node in graph.nodes() {
        let color = match node.kind {
            NodeKind::Junction => JUNCTION_COLOR,
            NodeKind::Endpoint => ENDPOINT_COLOR,
            NodeKind::Path => continue,
        };
        let centre = (node.position[0].round() as i32, node.position[1].round() as i32);
        draw_filled_circle_mut(canvas, centre, 2, color);
    }
}

fn draw_motifs(canvas: &mut RgbImage, motifs: &[Motif]) {
    for motif in motifs {
        draw_polyline(canvas, &motif.points, MOTIF_COLOR);
    }
}

fn draw_intersections(canvas: &mut RgbImage, intersections: &[Intersection]) {
    for hit in intersections {
        let centre = (hit.position[0].round() as i32, hit.position[1].round() as i32);
        let color = intersection_color(hit.kind);
        draw_filled_circle_mut(canvas, centre, 3, color);
        draw_hollow_circle_mut(canvas, centre, 5, color);
    }
}

/// Skeleton pixels painted green over the image
pub fn skeleton_overlay(image: &DynamicImage, skeleton: &GrayImage) -> RgbImage {
    let mut canvas = base(image);
    for (x, y, p) in skeleton.enumerate_pixels() {
        if p[0] > 0 && x < canvas.width() && y < canvas.height() {
            canvas.put_pixel(x, y, SKELETON_COLOR);
        }
    }
    canvas
}

/// Graph edges with junctions and endpoints marked
pub fn graph_overlay(image: &DynamicImage, graph: &BoundaryGraph) -> RgbImage {
    let mut canvas = base(image);
    draw_graph(&mut canvas, graph);
    canvas
}

/// Motif curves only
pub fn motif_overlay(image: &DynamicImage, motifs: &[Motif]) -> RgbImage {
    let mut canvas = base(image);
    draw_motifs(&mut canvas, motifs);
    canvas
}

/// Pruned graph, motifs and colour-coded intersections
pub fn annotated_overlay(image: &DynamicImage, analysis: &Analysis) -> RgbImage {
    let mut canvas = base(image);
    draw_graph(&mut canvas, analysis.artifacts.pruned_graph());
    draw_motifs(&mut canvas, analysis.artifacts.motifs());
    draw_intersections(&mut canvas, analysis.artifacts.intersections());
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motifs::MotifKind;
    use image::Luma;

    fn blank() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([128u8])))
    }

    #[test]
    fn skeleton_pixels_turn_green() {
        let mut skeleton = GrayImage::new(40, 30);
        skeleton.put_pixel(5, 6, Luma([255]));
        let overlay = skeleton_overlay(&blank(), &skeleton);
        assert_eq!(overlay.dimensions(), (40, 30));
        assert_eq!(*overlay.get_pixel(5, 6), SKELETON_COLOR);
        assert_eq!(*overlay.get_pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn motifs_are_drawn_in_blue() {
        let motif = Motif {
            id: "L-0".to_string(),
            kind: MotifKind::Linear,
            points: vec![[0.0, 10.0], [39.0, 10.0]],
            length_px: 39.0,
        };
        let overlay = motif_overlay(&blank(), &[motif]);
        assert_eq!(*overlay.get_pixel(20, 10), MOTIF_COLOR);
        assert_eq!(*overlay.get_pixel(20, 20), Rgb([128, 128, 128]));
    }

    #[test]
    fn graph_nodes_are_marked_by_kind() {
        let mut graph = BoundaryGraph::new(40, 30);
        let a = graph.insert_node([5.0, 5.0], NodeKind::Junction);
        let b = graph.insert_node([30.0, 5.0], NodeKind::Endpoint);
        graph.insert_edge(a, b, vec![[5.0, 5.0], [30.0, 5.0]]);
        let overlay = graph_overlay(&blank(), &graph);
        assert_eq!(*overlay.get_pixel(5, 5), JUNCTION_COLOR);
        assert_eq!(*overlay.get_pixel(30, 5), ENDPOINT_COLOR);
        assert_eq!(*overlay.get_pixel(15, 5), SKELETON_COLOR);
    }
}
