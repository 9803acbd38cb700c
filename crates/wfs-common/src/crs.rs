//! Coordinate Reference System types and the coordinate-transform capability.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::feature::{Geometry, Position};
use crate::BoundingBox;

/// Web Mercator half-extent in meters.
const MERCATOR_MAX_EXTENT: f64 = 20037508.342789244;
/// WGS84 semi-major axis used by Web Mercator.
const EARTH_RADIUS: f64 = 6378137.0;
/// Latitude limit of the Web Mercator square.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Well-known CRS codes supported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (degrees)
    Epsg4326,
    /// ETRS89 Geographic (degrees)
    Epsg4258,
    /// Web Mercator (meters)
    Epsg3857,
    /// ETRS89 / TM35FIN (meters)
    Epsg3067,
    /// ETRS89 / LAEA Europe (meters)
    Epsg3035,
}

impl CrsCode {
    /// Parse a CRS string from a request.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3067"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "EPSG:900913" (legacy alias of EPSG:3857)
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:4258" => Ok(CrsCode::Epsg4258),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:3067" => Ok(CrsCode::Epsg3067),
            "EPSG:3035" => Ok(CrsCode::Epsg3035),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4258)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg4258 => "EPSG:4258",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg3067 => "EPSG:3067",
            CrsCode::Epsg3035 => "EPSG:3035",
        };
        write!(f, "{}", code)
    }
}

/// Unit of measure of a coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisUnit {
    Degree,
    Metre,
}

impl AxisUnit {
    pub fn is_angular(&self) -> bool {
        matches!(self, AxisUnit::Degree)
    }
}

/// A reference system as seen by the rendering and encoding core: its code,
/// the unit of its first axis and its valid extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Crs {
    pub code: CrsCode,
    pub axis_unit: AxisUnit,
    pub valid_extent: BoundingBox,
}

impl Crs {
    pub fn new(code: CrsCode) -> Self {
        let axis_unit = if code.is_geographic() {
            AxisUnit::Degree
        } else {
            AxisUnit::Metre
        };

        Self {
            code,
            axis_unit,
            valid_extent: valid_bounds(code),
        }
    }

    /// Unit of the first coordinate axis.
    pub fn first_axis_unit(&self) -> AxisUnit {
        self.axis_unit
    }

    /// True when `bbox` overlaps the declared valid extent of this CRS.
    pub fn is_within(&self, bbox: &BoundingBox) -> bool {
        self.valid_extent.intersects(bbox)
    }
}

/// Get the valid bounds for a CRS.
fn valid_bounds(code: CrsCode) -> BoundingBox {
    match code {
        CrsCode::Epsg4326 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        // EPSG area of use for ETRS89
        CrsCode::Epsg4258 => BoundingBox::new(-16.1, 32.88, 40.18, 84.73),
        CrsCode::Epsg3857 => BoundingBox::new(
            -MERCATOR_MAX_EXTENT,
            -MERCATOR_MAX_EXTENT,
            MERCATOR_MAX_EXTENT,
            MERCATOR_MAX_EXTENT,
        ),
        CrsCode::Epsg3067 => BoundingBox::new(43547.79, 6549996.63, 764796.72, 7765459.01),
        CrsCode::Epsg3035 => BoundingBox::new(1896628.62, 1507846.05, 4662111.45, 6829874.45),
    }
}

/// Coordinate-transform capability consumed by the gateway and the sources.
pub trait CrsProvider: Send + Sync {
    /// Resolve a CRS code string to its reference system.
    fn lookup(&self, code: &str) -> Result<Crs, CrsParseError>;

    /// Transform a single coordinate between two systems.
    fn transform_point(&self, x: f64, y: f64, from: CrsCode, to: CrsCode)
        -> Result<(f64, f64), CrsParseError>;

    /// Transform an envelope by transforming its corners.
    fn transform_bbox(
        &self,
        bbox: &BoundingBox,
        from: CrsCode,
        to: CrsCode,
    ) -> Result<BoundingBox, CrsParseError> {
        if from == to {
            return Ok(*bbox);
        }
        let (x1, y1) = self.transform_point(bbox.min_x, bbox.min_y, from, to)?;
        let (x2, y2) = self.transform_point(bbox.max_x, bbox.max_y, from, to)?;
        Ok(BoundingBox::from_corners(x1, y1, x2, y2))
    }

    /// Transform every position of a geometry.
    fn transform_geometry(
        &self,
        geometry: &Geometry,
        from: CrsCode,
        to: CrsCode,
    ) -> Result<Geometry, CrsParseError> {
        if from == to {
            return Ok(geometry.clone());
        }
        geometry.try_map(|p| {
            let (x, y) = self.transform_point(p.x, p.y, from, to)?;
            Ok(Position::new(x, y))
        })
    }
}

/// Built-in provider: static CRS table, geographic <-> Web Mercator transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCrsProvider;

impl CrsProvider for BuiltinCrsProvider {
    fn lookup(&self, code: &str) -> Result<Crs, CrsParseError> {
        CrsCode::parse(code).map(Crs::new)
    }

    fn transform_point(
        &self,
        x: f64,
        y: f64,
        from: CrsCode,
        to: CrsCode,
    ) -> Result<(f64, f64), CrsParseError> {
        if from == to || (from.is_geographic() && to.is_geographic()) {
            return Ok((x, y));
        }

        match (from, to) {
            (f, CrsCode::Epsg3857) if f.is_geographic() => Ok(wgs84_to_mercator(x, y)),
            (CrsCode::Epsg3857, t) if t.is_geographic() => Ok(mercator_to_wgs84(x, y)),
            _ => Err(CrsParseError::UnsupportedTransform { from, to }),
        }
    }
}

/// Convert WGS84 (EPSG:4326) coordinates to Web Mercator (EPSG:3857)
pub fn wgs84_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = lon * EARTH_RADIUS * PI / 180.0;
    let y = EARTH_RADIUS * (PI / 4.0 + lat * PI / 360.0).tan().ln();
    (x, y)
}

/// Convert Web Mercator (EPSG:3857) coordinates to WGS84 (EPSG:4326)
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / MERCATOR_MAX_EXTENT) * 180.0;
    let lat = (y / MERCATOR_MAX_EXTENT) * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("No transform available from {from} to {to}")]
    UnsupportedTransform { from: CrsCode, to: CrsCode },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::parse("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("epsg:3857").unwrap(), CrsCode::Epsg3857);
        assert_eq!(CrsCode::parse("CRS:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("EPSG:3067").unwrap(), CrsCode::Epsg3067);
        assert!(CrsCode::parse("EPSG:99999").is_err());
    }

    #[test]
    fn test_axis_units() {
        assert_eq!(Crs::new(CrsCode::Epsg4326).first_axis_unit(), AxisUnit::Degree);
        assert_eq!(Crs::new(CrsCode::Epsg4258).first_axis_unit(), AxisUnit::Degree);
        assert_eq!(Crs::new(CrsCode::Epsg3857).first_axis_unit(), AxisUnit::Metre);
        assert_eq!(Crs::new(CrsCode::Epsg3067).first_axis_unit(), AxisUnit::Metre);
    }

    #[test]
    fn test_is_within() {
        let crs = Crs::new(CrsCode::Epsg3067);
        assert!(crs.is_within(&BoundingBox::new(380000.0, 6670000.0, 390000.0, 6680000.0)));
        assert!(!crs.is_within(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_mercator_round_trip() {
        let provider = BuiltinCrsProvider;
        let (x, y) = provider
            .transform_point(24.94, 60.17, CrsCode::Epsg4326, CrsCode::Epsg3857)
            .unwrap();
        let (lon, lat) = provider
            .transform_point(x, y, CrsCode::Epsg3857, CrsCode::Epsg4326)
            .unwrap();
        assert!((lon - 24.94).abs() < 1e-6);
        assert!((lat - 60.17).abs() < 1e-6);
    }

    #[test]
    fn test_transform_geometry() {
        let provider = BuiltinCrsProvider;
        let line = Geometry::LineString {
            coordinates: vec![Position::new(0.0, 0.0), Position::new(180.0, 0.0)],
        };
        let projected = provider
            .transform_geometry(&line, CrsCode::Epsg4326, CrsCode::Epsg3857)
            .unwrap();
        let positions = projected.positions();
        assert!(positions[0].x.abs() < 1e-6);
        assert!(positions[0].y.abs() < 1e-6);
        assert!((positions[1].x - MERCATOR_MAX_EXTENT).abs() < 1e-6);
        assert!(positions[1].y.abs() < 1e-6);
    }

    #[test]
    fn test_unsupported_transform() {
        let provider = BuiltinCrsProvider;
        let result = provider.transform_point(0.0, 0.0, CrsCode::Epsg3067, CrsCode::Epsg3857);
        assert!(matches!(result, Err(CrsParseError::UnsupportedTransform { .. })));
    }
}
