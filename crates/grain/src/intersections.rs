//! Crossings between motifs and the boundary graph.
//!
//! Raw crossing points are collected segment by segment (a stretch lying on
//! the boundary contributes only its two ends), grouped by a
//! density-based clustering with minimum cluster size 1, reduced to their
//! centroids and then classified against the graph's junctions and endpoints.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BoundingRect, EuclideanDistance};
use geo_types::{Coord, Line, Point as GeoPoint, Rect};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, warn};

use crate::{
    graph::BoundaryGraph,
    motifs::Motif,
    types::{to_line_string, Point},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionKind {
    Junction,
    Regular,
    Endpoint,
}

impl IntersectionKind {
    /// Name used in reports, endpoints are reported as extremities
    pub fn label(&self) -> &'static str {
        match self {
            IntersectionKind::Junction => "junction",
            IntersectionKind::Regular => "regular",
            IntersectionKind::Endpoint => "extremity",
        }
    }
}

/// Weight of each intersection kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub junction: f64,
    pub regular: f64,
    pub endpoint: f64,
}

impl ScoreTable {
    pub fn score(&self, kind: IntersectionKind) -> f64 {
        match kind {
            IntersectionKind::Junction => self.junction,
            IntersectionKind::Regular => self.regular,
            IntersectionKind::Endpoint => self.endpoint,
        }
    }
}

/// Built-in scoring profiles
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum NormProfile {
    #[default]
    #[serde(rename = "ASTM")]
    #[strum(serialize = "ASTM")]
    Astm,
    #[serde(rename = "Circular")]
    #[strum(serialize = "Circular")]
    Circular,
}

impl NormProfile {
    /// Look a profile up by name, unknown names fall back to ASTM
    pub fn resolve(name: &str) -> Self {
        name.trim().parse().unwrap_or_else(|_| {
            warn!(profile = name, "unknown norm profile, using ASTM");
            NormProfile::Astm
        })
    }

    pub fn weights(&self) -> ScoreTable {
        match self {
            NormProfile::Astm => ScoreTable { junction: 1.5, regular: 1.0, endpoint: 0.5 },
            NormProfile::Circular => ScoreTable { junction: 2.0, regular: 1.0, endpoint: 0.5 },
        }
    }

    /// Every built-in profile with its weight table
    pub fn catalogue() -> Vec<(NormProfile, ScoreTable)> {
        NormProfile::iter().map(|p| (p, p.weights())).collect()
    }
}

/// Which motif a cluster of raw crossings is credited to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttributionPolicy {
    /// Motif of the first crossing found in the cluster
    #[default]
    FirstDiscovered,
    /// Member motif whose geometry lies closest to the cluster centroid
    NearestMotif,
}

/// One scored cluster of crossings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub id: usize,
    pub position: Point,
    #[serde(rename = "type")]
    pub kind: IntersectionKind,
    pub score: f64,
    pub motif_id: String,
    /// Raw crossings merged into this record
    pub members: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCrossing {
    pub position: Point,
    pub motif_index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct IntersectionSettings {
    pub epsilon_px: f64,
    pub profile: NormProfile,
    pub attribution: AttributionPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct IntersectionOutcome {
    pub intersections: Vec<Intersection>,
    pub raw_crossings: usize,
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

fn segments(points: &[Point]) -> Vec<Line<f64>> {
    points
        .windows(2)
        .map(|w| Line::new(Coord { x: w[0][0], y: w[0][1] }, Coord { x: w[1][0], y: w[1][1] }))
        .collect()
}

/// Arc length along a motif of `c`, which lies on `segment` starting at `offset`
fn arc_position(segment: &Line<f64>, offset: f64, c: Coord<f64>) -> f64 {
    let d = segment.delta();
    let len2 = d.x * d.x + d.y * d.y;
    if len2 == 0.0 {
        return offset;
    }
    let t = ((c.x - segment.start.x) * d.x + (c.y - segment.start.y) * d.y) / len2;
    offset + t.clamp(0.0, 1.0) * len2.sqrt()
}

/// A collinear overlap as an arc length interval along the motif
#[derive(Debug, Clone, Copy)]
struct Overlap {
    from: (f64, Coord<f64>),
    to: (f64, Coord<f64>),
}

const ARC_TOLERANCE: f64 = 1e-9;

/// Join overlaps that touch or overlap along the motif into single intervals
fn merge_overlaps(mut overlaps: Vec<Overlap>) -> Vec<Overlap> {
    overlaps.sort_by(|a, b| a.from.0.total_cmp(&b.from.0));
    let mut merged: Vec<Overlap> = Vec::with_capacity(overlaps.len());
    for overlap in overlaps {
        match merged.last_mut() {
            Some(last) if overlap.from.0 <= last.to.0 + ARC_TOLERANCE => {
                if overlap.to.0 > last.to.0 {
                    last.to = overlap.to;
                }
            }
            _ => merged.push(overlap),
        }
    }
    merged
}

/// Every point where a motif touches an edge polyline, exact duplicates removed per motif.
///
/// A stretch where the motif runs along the boundary counts only at its two
/// extreme points, however many pixel segments it spans.
pub fn raw_crossings(motifs: &[Motif], graph: &BoundaryGraph) -> Vec<RawCrossing> {
    let edges: Vec<(Rect<f64>, Vec<Line<f64>>)> = graph
        .edges()
        .filter(|e| e.polyline.len() >= 2)
        .filter_map(|e| {
            let rect = to_line_string(&e.polyline).bounding_rect()?;
            Some((rect, segments(&e.polyline)))
        })
        .collect();

    let mut crossings = Vec::new();
    for (motif_index, motif) in motifs.iter().enumerate() {
        let Some(motif_rect) = motif.to_line_string().bounding_rect() else {
            continue;
        };
        let motif_segments = segments(&motif.points);
        let offsets: Vec<f64> = motif_segments
            .iter()
            .scan(0.0, |acc, m| {
                let start = *acc;
                let d = m.delta();
                *acc += d.x.hypot(d.y);
                Some(start)
            })
            .collect();

        let mut points: Vec<(f64, Coord<f64>)> = Vec::new();
        let mut overlaps: Vec<Overlap> = Vec::new();
        for (edge_rect, edge_segments) in &edges {
            if !rects_overlap(&motif_rect, edge_rect) {
                continue;
            }
            for (m, &offset) in motif_segments.iter().zip(&offsets) {
                for e in edge_segments {
                    match line_intersection(*m, *e) {
                        Some(LineIntersection::SinglePoint { intersection, .. }) => {
                            points.push((arc_position(m, offset, intersection), intersection));
                        }
                        Some(LineIntersection::Collinear { intersection }) => {
                            let a = (arc_position(m, offset, intersection.start), intersection.start);
                            let b = (arc_position(m, offset, intersection.end), intersection.end);
                            let (from, to) = if a.0 <= b.0 { (a, b) } else { (b, a) };
                            overlaps.push(Overlap { from, to });
                        }
                        None => {}
                    }
                }
            }
        }

        let overlaps = merge_overlaps(overlaps);
        let inside = |s: f64| {
            overlaps
                .iter()
                .any(|o| s > o.from.0 + ARC_TOLERANCE && s < o.to.0 - ARC_TOLERANCE)
        };
        points.retain(|(s, _)| !inside(*s));
        points.extend(overlaps.iter().flat_map(|o| [o.from, o.to]));
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut seen: HashSet<(u64, u64)> = HashSet::new();
        for (_, c) in points {
            if seen.insert((c.x.to_bits(), c.y.to_bits())) {
                crossings.push(RawCrossing { position: [c.x, c.y], motif_index });
            }
        }
    }
    crossings
}

/// Density-based cluster labels with minimum cluster size 1.
///
/// Points within `eps` of each other (inclusive) share a label, transitively.
/// Labels are numbered in order of first appearance.
pub fn cluster_points(points: &[Point], eps: f64) -> Vec<usize> {
    let cell = if eps > 0.0 { eps } else { 1.0 };
    let key = |p: &Point| ((p[0] / cell).floor() as i64, (p[1] / cell).floor() as i64);

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        grid.entry(key(p)).or_default().push(i);
    }

    let mut labels = vec![usize::MAX; points.len()];
    let mut next = 0;
    for seed in 0..points.len() {
        if labels[seed] != usize::MAX {
            continue;
        }
        labels[seed] = next;
        let mut queue = VecDeque::from([seed]);
        while let Some(i) = queue.pop_front() {
            let (cx, cy) = key(&points[i]);
            for gx in cx - 1..=cx + 1 {
                for gy in cy - 1..=cy + 1 {
                    let Some(bucket) = grid.get(&(gx, gy)) else { continue };
                    for &j in bucket {
                        if labels[j] != usize::MAX {
                            continue;
                        }
                        let (dx, dy) = (points[j][0] - points[i][0], points[j][1] - points[i][1]);
                        if (dx * dx + dy * dy).sqrt() <= eps {
                            labels[j] = next;
                            queue.push_back(j);
                        }
                    }
                }
            }
        }
        next += 1;
    }
    labels
}

/// Member indices of each label, in ascending order
pub fn group_by_label(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

/// Junction proximity wins over endpoint proximity, anything else is regular
pub fn classify(position: Point, graph: &BoundaryGraph, epsilon_px: f64) -> IntersectionKind {
    let near = |p: &Point| ((p[0] - position[0]).powi(2) + (p[1] - position[1]).powi(2)).sqrt() <= epsilon_px;
    if graph.junctions().any(|n| near(&n.position)) {
        IntersectionKind::Junction
    } else if graph.endpoints().any(|n| near(&n.position)) {
        IntersectionKind::Endpoint
    } else {
        IntersectionKind::Regular
    }
}

fn attribute(
    members: &[usize],
    crossings: &[RawCrossing],
    motifs: &[Motif],
    centroid: Point,
    policy: AttributionPolicy,
) -> usize {
    let first = crossings[members[0]].motif_index;
    match policy {
        AttributionPolicy::FirstDiscovered => first,
        AttributionPolicy::NearestMotif => {
            let centre = GeoPoint::new(centroid[0], centroid[1]);
            let mut best = (first, f64::INFINITY);
            let mut candidates: Vec<usize> = members.iter().map(|&m| crossings[m].motif_index).collect();
            candidates.dedup();
            for index in candidates {
                let distance = centre.euclidean_distance(&motifs[index].to_line_string());
                if distance < best.1 {
                    best = (index, distance);
                }
            }
            best.0
        }
    }
}

/// Intersect, cluster, classify and score
pub fn detect_intersections(
    motifs: &[Motif],
    graph: &BoundaryGraph,
    settings: &IntersectionSettings,
) -> IntersectionOutcome {
    let crossings = raw_crossings(motifs, graph);
    if crossings.is_empty() {
        debug!("no motif crosses the boundary graph");
        return IntersectionOutcome::default();
    }

    let points: Vec<Point> = crossings.iter().map(|c| c.position).collect();
    let labels = cluster_points(&points, settings.epsilon_px);
    let weights = settings.profile.weights();

    let intersections: Vec<Intersection> = group_by_label(&labels)
        .into_iter()
        .map(|(label, members)| {
            let n = members.len() as f64;
            let centroid = [
                members.iter().map(|&m| points[m][0]).sum::<f64>() / n,
                members.iter().map(|&m| points[m][1]).sum::<f64>() / n,
            ];
            let kind = classify(centroid, graph, settings.epsilon_px);
            let motif = attribute(&members, &crossings, motifs, centroid, settings.attribution);
            Intersection {
                id: label + 1,
                position: centroid,
                kind,
                score: weights.score(kind),
                motif_id: motifs[motif].id.clone(),
                members: members.len(),
            }
        })
        .collect();

    debug!(
        raw = crossings.len(),
        clusters = intersections.len(),
        epsilon_px = settings.epsilon_px,
        profile = %settings.profile,
        "intersections detected"
    );
    IntersectionOutcome {
        intersections,
        raw_crossings: crossings.len(),
    }
}
