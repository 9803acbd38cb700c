//! GeoJSON serialization of feature collections with bounded precision.

use serde_json::{json, Value};

use crate::feature::{FeatureCollection, Geometry, Position};
use crate::precision::round_to;

/// Media type of GeoJSON responses.
pub const GEOJSON_CONTENT_TYPE: &str = "application/vnd.geo+json";

/// Canonical document written for an empty collection.
pub const EMPTY_FEATURE_COLLECTION: &[u8] = br#"{"type": "FeatureCollection", "features": []}"#;

/// Serialize `fc` as a GeoJSON FeatureCollection, writing at most `decimals`
/// decimal places per coordinate.
pub fn write_feature_collection(
    fc: &FeatureCollection,
    decimals: u32,
) -> Result<Vec<u8>, serde_json::Error> {
    if fc.is_empty() {
        return Ok(EMPTY_FEATURE_COLLECTION.to_vec());
    }

    let features: Vec<Value> = fc
        .iter()
        .map(|feature| -> Result<Value, serde_json::Error> {
            let geometry = match &feature.geometry {
                Some(geometry) => serde_json::to_value(round_geometry(geometry, decimals))?,
                None => Value::Null,
            };

            let mut object = json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": feature.properties,
            });
            if let Some(id) = &feature.id {
                object["id"] = id.clone();
            }
            Ok(object)
        })
        .collect::<Result<_, _>>()?;

    serde_json::to_vec(&json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

fn round_geometry(geometry: &Geometry, decimals: u32) -> Geometry {
    geometry.map(|p| Position::new(round_to(p.x, decimals), round_to(p.y, decimals)))
}
