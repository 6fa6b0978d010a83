use std::marker::PhantomData;
use serde::{Deserialize, Serialize};
use geojson::{Geometry, JsonObject};
use ts_rs::TS;
use schemars::JsonSchema;

/// Properties of the analysis layers, tagged by layer name
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS, JsonSchema)]
#[ts(export)]
#[serde(tag = "layer", rename_all = "snake_case")]
#[schemars(description = "Properties of a grain analysis feature")]
pub enum GrainFeatureProperties {
    /// A pruned boundary segment
    Edge {
        #[schemars(description = "Edge identifier in the pruned graph")]
        id: usize,
        #[schemars(description = "Geodesic length in pixels")]
        length_px: f64,
    },
    /// A measurement curve
    Motif {
        id: String,
        #[schemars(description = "linear or circular")]
        kind: String,
        length_px: f64,
    },
    /// A scored intersection cluster
    Intersection {
        id: usize,
        #[schemars(description = "junction, regular or extremity")]
        kind: String,
        score: f64,
        motif_id: String,
    },
}

impl GrainFeatureProperties {
    pub fn layer(&self) -> &'static str {
        match self {
            GrainFeatureProperties::Edge { .. } => "edge",
            GrainFeatureProperties::Motif { .. } => "motif",
            GrainFeatureProperties::Intersection { .. } => "intersection",
        }
    }
}

/// Type alias for grain analysis GeoJSON
pub type GrainGeoJson = TypedGeoJson<GrainFeatureProperties>;

/// A typed GeoJSON Feature that is generic over its properties.
#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: geojson::Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    /// Creates a new TypedFeature.
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Tries to access the typed properties of the feature.
    pub fn properties(&self) -> Option<P> {
        self.feature.properties.as_ref().and_then(|p| {
            serde_json::from_value(serde_json::Value::Object(p.clone())).ok()
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum TypedGeoJson<P> {
    Geometry(Geometry),
    Feature(TypedFeature<P>),
    FeatureCollection(TypedFeatureCollection<P>),
}

impl<P> TypedGeoJson<P> {
    fn as_feature_collection(&self) -> Option<&TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl GrainGeoJson {
    /// Features of one layer ("edge", "motif" or "intersection")
    pub fn layer(&self, name: &str) -> Vec<&TypedFeature<GrainFeatureProperties>> {
        self.as_feature_collection()
            .map(|fc| {
                fc.features
                    .iter()
                    .filter(|f| f.properties().is_some_and(|p| p.layer() == name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sum of intersection scores, equal to the weighted intersection count
    pub fn total_score(&self) -> f64 {
        self.layer("intersection")
            .iter()
            .filter_map(|f| match f.properties() {
                Some(GrainFeatureProperties::Intersection { score, .. }) => Some(score),
                _ => None,
            })
            .sum()
    }

    /// Get metadata from foreign members
    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        let foreign = self.as_feature_collection()?.foreign_members.as_ref()?;
        let width = foreign.get("image_width")?.as_u64()? as u32;
        let height = foreign.get("image_height")?.as_u64()? as u32;
        Some((width, height))
    }

    /// The metrics object stored alongside the features
    pub fn metrics(&self) -> Option<&serde_json::Value> {
        self.as_feature_collection()?.foreign_members.as_ref()?.get("metrics")
    }
}
