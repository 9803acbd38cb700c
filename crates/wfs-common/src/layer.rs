//! Layer descriptors for feature layers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::feature::DEFAULT_GEOMETRY_NAME;

/// Name of the style entry used when a requested style is missing.
pub const STYLE_DEFAULT: &str = "default";

/// Style names with this prefix denote a per-client custom style.
pub const CUSTOM_STYLE_PREFIX: &str = "oskari_custom";

/// Unique identifier for a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Numeric id of a user-uploaded layer, e.g. `userlayer_12` -> 12.
    pub fn user_layer_id(&self) -> Option<i64> {
        self.0.strip_prefix("userlayer_")?.parse().ok()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_geometry_property() -> String {
    DEFAULT_GEOMETRY_NAME.to_string()
}

fn default_wfs_version() -> String {
    "1.1.0".to_string()
}

/// Where the features of a layer come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSource {
    /// Remote WFS endpoint answering GetFeature with GeoJSON.
    Wfs {
        url: String,
        feature_type: String,
        #[serde(default = "default_wfs_version")]
        version: String,
    },

    /// GeoJSON file stored in the layer's native CRS.
    File { path: String, crs: String },
}

/// A feature layer definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: LayerId,

    /// Human-readable title
    #[serde(default)]
    pub title: String,

    /// Name of the geometry property of the layer's features
    #[serde(default = "default_geometry_property")]
    pub geometry_property: String,

    /// Named style documents
    #[serde(default)]
    pub styles: HashMap<String, Value>,

    /// Style used for selected (highlighted) features
    #[serde(default)]
    pub selection_style: Option<Value>,

    pub source: LayerSource,
}

impl LayerDescriptor {
    /// Find a style document by name.
    pub fn style(&self, name: &str) -> Option<&Value> {
        self.styles.get(name)
    }

    /// The layer's "default" style document.
    pub fn default_style(&self) -> Option<&Value> {
        self.styles.get(STYLE_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_layer_id() {
        assert_eq!(LayerId::new("userlayer_12").user_layer_id(), Some(12));
        assert_eq!(LayerId::new("userlayer_x").user_layer_id(), None);
        assert_eq!(LayerId::new("roads").user_layer_id(), None);
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "id": "roads",
            "styles": {"default": {"name": "roads"}},
            "source": {"type": "wfs", "url": "https://example.com/wfs", "feature_type": "tie:roads"}
        }"#;
        let layer: LayerDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(layer.geometry_property, "geometry");
        assert!(layer.default_style().is_some());
        assert!(layer.selection_style.is_none());
        match layer.source {
            LayerSource::Wfs { version, .. } => assert_eq!(version, "1.1.0"),
            _ => panic!("expected wfs source"),
        }
    }
}
