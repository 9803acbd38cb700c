//! Vector feature model shared by the gateway, the sources and the renderer.
//!
//! Geometries follow the GeoJSON object layout so that feature sources can
//! deserialize service responses directly.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BoundingBox, CrsCode};

/// Default name of the geometry property when a source does not report one.
pub const DEFAULT_GEOMETRY_NAME: &str = "geometry";

/// A 2D coordinate. Extra ordinates (z, m) are dropped on input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.x)?;
        tuple.serialize_element(&self.y)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ordinates = Vec::<f64>::deserialize(deserializer)?;
        if ordinates.len() < 2 {
            return Err(de::Error::invalid_length(
                ordinates.len(),
                &"a position with at least two ordinates",
            ));
        }
        Ok(Position::new(ordinates[0], ordinates[1]))
    }
}

/// Broad geometry classes used for symbolizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

/// Supported GeoJSON geometry types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    /// Rings: first is exterior, rest are holes.
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point { .. } | Geometry::MultiPoint { .. } => GeometryKind::Point,
            Geometry::LineString { .. } | Geometry::MultiLineString { .. } => GeometryKind::Line,
            Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => GeometryKind::Polygon,
        }
    }

    /// Visit every position of the geometry.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Geometry::Point { coordinates } => vec![*coordinates],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.clone()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().copied().collect()
            }
        }
    }

    /// Envelope of the geometry, `None` when it has no positions.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let positions = self.positions();
        let first = positions.first()?;
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in &positions[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// Build a new geometry by mapping every position through `f`.
    pub fn try_map<E>(&self, mut f: impl FnMut(Position) -> Result<Position, E>) -> Result<Geometry, E> {
        fn ring<E>(
            ring: &[Position],
            f: &mut impl FnMut(Position) -> Result<Position, E>,
        ) -> Result<Vec<Position>, E> {
            ring.iter().map(|p| f(*p)).collect()
        }

        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: f(*coordinates)?,
            },
            Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
                coordinates: ring(coordinates, &mut f)?,
            },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: ring(coordinates, &mut f)?,
            },
            Geometry::MultiLineString { coordinates } => Geometry::MultiLineString {
                coordinates: coordinates
                    .iter()
                    .map(|line| ring(line, &mut f))
                    .collect::<Result<_, _>>()?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|r| ring(r, &mut f))
                    .collect::<Result<_, _>>()?,
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|polygon| {
                        polygon
                            .iter()
                            .map(|r| ring(r, &mut f))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    /// Infallible variant of [`Geometry::try_map`].
    pub fn map(&self, mut f: impl FnMut(Position) -> Position) -> Geometry {
        match self.try_map::<std::convert::Infallible>(|p| Ok(f(p))) {
            Ok(geometry) => geometry,
            Err(never) => match never {},
        }
    }
}

fn default_geometry_name() -> String {
    DEFAULT_GEOMETRY_NAME.to_string()
}

/// A single feature: geometry plus attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default)]
    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Name of the property the geometry was read from.
    #[serde(default = "default_geometry_name", rename = "geometry_name")]
    pub geometry_name: String,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: Map::new(),
            geometry_name: default_geometry_name(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_geometry_name(mut self, name: impl Into<String>) -> Self {
        self.geometry_name = name.into();
        self
    }

    /// String rendering of a property value, used for labels.
    pub fn property_text(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct RawFeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

/// Ordered features sharing one CRS. Built per request and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub crs: CrsCode,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(crs: CrsCode) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    pub fn with_features(crs: CrsCode, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    /// Parse a GeoJSON FeatureCollection document whose coordinates are in `crs`.
    pub fn from_geojson(bytes: &[u8], crs: CrsCode) -> Result<Self, serde_json::Error> {
        let raw: RawFeatureCollection = serde_json::from_slice(bytes)?;
        Ok(Self {
            crs,
            features: raw.features,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Keep only features whose envelope touches `bbox`.
    pub fn retain_within(&mut self, bbox: &BoundingBox) {
        self.features.retain(|feature| {
            feature
                .geometry
                .as_ref()
                .and_then(Geometry::bbox)
                .map(|env| {
                    env.min_x <= bbox.max_x
                        && env.max_x >= bbox.min_x
                        && env.min_y <= bbox.max_y
                        && env.max_y >= bbox.min_y
                })
                .unwrap_or(false)
        });
    }
}
