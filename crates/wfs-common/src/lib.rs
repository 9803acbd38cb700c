//! Common types and utilities shared across the feature tile services.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod feature;
pub mod geojson;
pub mod layer;
pub mod precision;

pub use bbox::BoundingBox;
pub use crs::{AxisUnit, BuiltinCrsProvider, Crs, CrsCode, CrsProvider};
pub use error::{MapError, MapResult};
pub use feature::{Feature, FeatureCollection, Geometry, GeometryKind, Position};
pub use layer::{LayerDescriptor, LayerId, LayerSource};
pub use precision::decimals_for;
