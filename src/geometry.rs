use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::CrsId;

/// Lon/lat or easting/northing pair, axis order as GeoJSON (x, y).
pub type Position = [f64; 2];

/// Vector geometry in GeoJSON layout. The portal serves polygon coverages for
/// the vegetation and coral maps and point records for the mammal surveys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Rebuilds the geometry with every position passed through `f`.
    pub fn try_map_positions<E>(
        &self,
        f: &mut impl FnMut(Position) -> Result<Position, E>,
    ) -> Result<Geometry, E> {
        fn map_line<E>(
            line: &[Position],
            f: &mut impl FnMut(Position) -> Result<Position, E>,
        ) -> Result<Vec<Position>, E> {
            line.iter().map(|pos| f(*pos)).collect()
        }

        fn map_rings<E>(
            rings: &[Vec<Position>],
            f: &mut impl FnMut(Position) -> Result<Position, E>,
        ) -> Result<Vec<Vec<Position>>, E> {
            rings.iter().map(|ring| map_line(ring, &mut *f)).collect()
        }

        Ok(match self {
            Geometry::Point(pos) => Geometry::Point(f(*pos)?),
            Geometry::MultiPoint(points) => Geometry::MultiPoint(map_line(points, f)?),
            Geometry::LineString(line) => Geometry::LineString(map_line(line, f)?),
            Geometry::MultiLineString(lines) => Geometry::MultiLineString(map_rings(lines, f)?),
            Geometry::Polygon(rings) => Geometry::Polygon(map_rings(rings, f)?),
            Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| map_rings(rings, &mut *f))
                    .collect::<Result<_, E>>()?,
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Map<String, Value>) -> Self {
        Self {
            kind: feature_kind(),
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_kind")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: collection_kind(),
            features,
        }
    }
}

fn feature_kind() -> String {
    "Feature".to_string()
}

fn collection_kind() -> String {
    "FeatureCollection".to_string()
}

/// Vector payload pulled from the portal, owned by the invocation that
/// fetched it and dropped after materialization.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub features: Vec<Feature>,
    pub source_crs: CrsId,
}
