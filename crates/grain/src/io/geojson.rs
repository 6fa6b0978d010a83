use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, Value};
use crate::{
    error::Result,
    types::{AnalysisResult, Point},
    typed_geojson::{GrainFeatureProperties, GrainGeoJson, TypedFeature, TypedFeatureCollection},
};

fn line_string(points: &[Point]) -> Geometry {
    Geometry::new(Value::LineString(points.iter().map(|&[x, y]| vec![x, y]).collect()))
}

fn point(p: Point) -> Geometry {
    Geometry::new(Value::Point(vec![p[0], p[1]]))
}

impl AnalysisResult {
    fn features(&self) -> Vec<(Geometry, GrainFeatureProperties)> {
        let edges = self.edges_stats.edges.iter().filter(|e| e.coords.len() >= 2).map(|edge| {
            (
                line_string(&edge.coords),
                GrainFeatureProperties::Edge { id: edge.id, length_px: edge.length_px },
            )
        });
        let motifs = self.motifs.iter().map(|motif| {
            let kind = serde_json::to_value(motif.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            (
                line_string(&motif.points),
                GrainFeatureProperties::Motif { id: motif.id.clone(), kind, length_px: motif.length_px },
            )
        });
        let intersections = self.intersections.iter().map(|hit| {
            (
                point(hit.position),
                GrainFeatureProperties::Intersection {
                    id: hit.id,
                    kind: hit.kind.label().to_string(),
                    score: hit.score,
                    motif_id: hit.motif_id.clone(),
                },
            )
        });
        edges.chain(motifs).chain(intersections).collect()
    }

    fn foreign_members(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut foreign_members = serde_json::Map::new();
        foreign_members.insert("image_width".to_string(), self.image_width.into());
        foreign_members.insert("image_height".to_string(), self.image_height.into());
        foreign_members.insert("metrics".to_string(), serde_json::to_value(self.metrics)?);
        foreign_members.insert("warnings".to_string(), serde_json::to_value(&self.warnings)?);
        Ok(foreign_members)
    }

    /// Export to typed GeoJSON format
    pub fn to_typed_geojson(&self) -> Result<GrainGeoJson> {
        let features = self
            .features()
            .into_iter()
            .map(|(geometry, properties)| TypedFeature::new(Some(geometry), properties))
            .collect();

        Ok(GrainGeoJson::FeatureCollection(TypedFeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()?),
        }))
    }

    /// Edges and motifs as LineStrings, intersections as Points
    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut features = Vec::new();
        for (i, (geometry, properties)) in self.features().into_iter().enumerate() {
            let properties = serde_json::to_value(properties)?.as_object().cloned();
            features.push(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: Some(geojson::feature::Id::Number(serde_json::Number::from(i))),
                properties,
                foreign_members: None,
            });
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()?),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        let geojson = self.to_geojson()?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::AnalysisParameters,
        intersections::{Intersection, IntersectionKind},
        motifs::{Motif, MotifKind},
        typed_geojson::GrainFeatureProperties,
        types::{AnalysisResult, DebugStats, EdgeGeometry, EdgeStats, Metrics, Timings},
    };

    fn sample() -> AnalysisResult {
        AnalysisResult {
            image_width: 64,
            image_height: 32,
            metrics: Metrics { l_mm: 0.064, n_int: 2.5, ..Metrics::default() },
            intersections: vec![
                Intersection {
                    id: 1,
                    position: [10.0, 16.0],
                    kind: IntersectionKind::Junction,
                    score: 1.5,
                    motif_id: "L-0".to_string(),
                    members: 2,
                },
                Intersection {
                    id: 2,
                    position: [40.0, 16.0],
                    kind: IntersectionKind::Regular,
                    score: 1.0,
                    motif_id: "L-0".to_string(),
                    members: 1,
                },
            ],
            edges_stats: EdgeStats {
                n_nodes: 2,
                n_edges: 1,
                mean_edge_length_px: 31.0,
                edges: vec![EdgeGeometry { id: 0, length_px: 31.0, coords: vec![[10.0, 0.0], [10.0, 31.0]] }],
            },
            motifs: vec![Motif {
                id: "L-0".to_string(),
                kind: MotifKind::Linear,
                points: vec![[0.0, 16.0], [64.0, 16.0]],
                length_px: 64.0,
            }],
            warnings: vec!["Low number of intersections (2) may lead to statistically insignificant results.".to_string()],
            timings: Timings::default(),
            params_used: AnalysisParameters::default(),
            debug_stats: DebugStats::default(),
        }
    }

    #[test]
    fn plain_geojson_has_every_layer() {
        let collection = sample().to_geojson().expect("GeoJSON");
        assert_eq!(collection.features.len(), 4);

        let layers: Vec<String> = collection
            .features
            .iter()
            .filter_map(|f| f.property("layer").and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        assert_eq!(layers, vec!["edge", "motif", "intersection", "intersection"]);

        let foreign = collection.foreign_members.expect("foreign members");
        assert_eq!(foreign["image_width"], 64);
        assert_eq!(foreign["metrics"]["N_int"], 2.5);
    }

    #[test]
    fn typed_geojson_reads_back_properties() {
        let typed = sample().to_typed_geojson().expect("typed GeoJSON");
        assert_eq!(typed.image_dimensions(), Some((64, 32)));
        assert_eq!(typed.layer("intersection").len(), 2);
        assert_eq!(typed.total_score(), 2.5);
        assert_eq!(typed.metrics().map(|m| m["N_int"].clone()), Some(serde_json::json!(2.5)));

        let motif = typed.layer("motif")[0].properties().expect("motif properties");
        assert_eq!(
            motif,
            GrainFeatureProperties::Motif { id: "L-0".to_string(), kind: "linear".to_string(), length_px: 64.0 }
        );
    }

    #[test]
    fn geojson_string_parses_back() {
        let text = sample().to_geojson_string().expect("string");
        let parsed: geojson::GeoJson = text.parse().expect("valid GeoJSON");
        assert!(matches!(parsed, geojson::GeoJson::FeatureCollection(_)));
    }
}
