//! Feature Query Gateway.
//!
//! Validates a request bbox against the target CRS, retrieves features
//! through a [`FeatureSource`] and applies per-layer content processing.
//! Retrieval failures of any kind are reported with one generic message;
//! the cause is logged and kept as the error source.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use wfs_common::crs::{Crs, CrsProvider};
use wfs_common::feature::FeatureCollection;
use wfs_common::layer::{LayerDescriptor, LayerId};
use wfs_common::{BoundingBox, MapError, MapResult};

use crate::sources::{FeatureQuery, FeatureSource, SourceError};

/// Parse and check a request bbox.
///
/// Exactly four numeric components are required. A box that does not touch
/// the valid extent of `crs` is rejected outright rather than clamped.
pub fn validate_bbox(raw: &str, crs: &Crs) -> MapResult<BoundingBox> {
    let bbox = BoundingBox::parse(raw)?;
    if !crs.is_within(&bbox) {
        return Err(MapError::bbox_out_of_extent());
    }
    Ok(bbox)
}

/// Post-processing applied to retrieved features of a layer.
pub trait ContentProcessor: Send + Sync {
    fn process(&self, fc: &mut FeatureCollection);
}

/// Properties the user layer store adds to every feature.
const USER_LAYER_BOOKKEEPING: [&str; 4] = ["user_layer_id", "uuid", "created", "updated"];

/// Keeps the features of one user-uploaded layer and hides the store's
/// bookkeeping properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLayerProcessor {
    pub user_layer_id: i64,
}

impl UserLayerProcessor {
    fn belongs(&self, value: Option<&Value>) -> bool {
        match value {
            Some(Value::Number(n)) => n.as_i64() == Some(self.user_layer_id),
            Some(Value::String(s)) => s.parse::<i64>().ok() == Some(self.user_layer_id),
            _ => false,
        }
    }
}

impl ContentProcessor for UserLayerProcessor {
    fn process(&self, fc: &mut FeatureCollection) {
        fc.features
            .retain(|feature| self.belongs(feature.properties.get("user_layer_id")));
        for feature in &mut fc.features {
            for name in USER_LAYER_BOOKKEEPING {
                feature.properties.remove(name);
            }
        }
    }
}

/// Content processor for a layer id, if the layer needs one.
pub fn content_processor_for(layer_id: &LayerId) -> Option<UserLayerProcessor> {
    layer_id
        .user_layer_id()
        .map(|user_layer_id| UserLayerProcessor { user_layer_id })
}

/// Validates requests and retrieves features.
#[derive(Clone)]
pub struct FeatureGateway {
    source: Arc<dyn FeatureSource>,
    crs_provider: Arc<dyn CrsProvider>,
    fetch_timeout: Option<Duration>,
}

impl FeatureGateway {
    pub fn new(source: Arc<dyn FeatureSource>, crs_provider: Arc<dyn CrsProvider>) -> Self {
        Self {
            source,
            crs_provider,
            fetch_timeout: None,
        }
    }

    /// Bound the duration of each retrieval.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Resolve a CRS code from a request.
    pub fn lookup_crs(&self, code: &str) -> MapResult<Crs> {
        Ok(self.crs_provider.lookup(code)?)
    }

    pub fn validate_bbox(&self, raw: &str, crs: &Crs) -> MapResult<BoundingBox> {
        validate_bbox(raw, crs)
    }

    /// Retrieve the features of `layer` within `bbox`, in `crs`.
    pub async fn fetch_features(
        &self,
        layer_id: &str,
        user_id: &str,
        layer: &LayerDescriptor,
        bbox: BoundingBox,
        crs: &Crs,
        processor: Option<&dyn ContentProcessor>,
    ) -> MapResult<FeatureCollection> {
        let query = FeatureQuery {
            layer_id,
            user_id,
            layer,
            bbox,
            crs,
        };

        let result = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.source.get_features(&query)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(limit)),
            },
            None => self.source.get_features(&query).await,
        };

        let mut fc = match result {
            Ok(fc) => fc,
            Err(e) => {
                error!(layer = layer_id, user = user_id, error = %e, "Failed to retrieve features");
                return Err(MapError::retrieval(e));
            }
        };

        if let Some(processor) = processor {
            processor.process(&mut fc);
        }

        debug!(layer = layer_id, features = fc.len(), "Features retrieved");
        Ok(fc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wfs_common::feature::{Feature, Geometry, Position};
    use wfs_common::CrsCode;

    fn point(user_layer_id: Value) -> Feature {
        Feature::new(Geometry::Point {
            coordinates: Position::new(1.0, 1.0),
        })
        .with_property("user_layer_id", user_layer_id)
        .with_property("uuid", "abc")
        .with_property("name", "kept")
    }

    #[test]
    fn test_validate_bbox() {
        let crs = Crs::new(CrsCode::Epsg4326);
        assert_eq!(
            validate_bbox("1,2,3,4", &crs).unwrap(),
            BoundingBox::new(1.0, 2.0, 3.0, 4.0)
        );
    }

    #[test]
    fn test_validate_bbox_wrong_arity() {
        let crs = Crs::new(CrsCode::Epsg4326);
        for raw in ["1,2,3", "1,2,3,4,5", "", "a,b,c,d", "1,2,3,NaN"] {
            let err = validate_bbox(raw, &crs).unwrap_err();
            assert!(matches!(err, MapError::InvalidInput(_)), "{}", raw);
            assert_eq!(err.to_string(), "Invalid bbox");
        }
    }

    #[test]
    fn test_validate_bbox_out_of_extent() {
        let crs = Crs::new(CrsCode::Epsg3067);
        let err = validate_bbox("1,2,3,4", &crs).unwrap_err();
        assert!(matches!(err, MapError::OutOfExtent(_)));
        assert_eq!(err.to_string(), "bbox not within CRS extent");
    }

    #[test]
    fn test_content_processor_for() {
        assert_eq!(
            content_processor_for(&LayerId::new("userlayer_5")),
            Some(UserLayerProcessor { user_layer_id: 5 })
        );
        assert_eq!(content_processor_for(&LayerId::new("roads")), None);
    }

    #[test]
    fn test_user_layer_processor() {
        let mut fc = FeatureCollection::with_features(
            CrsCode::Epsg3857,
            vec![point(json!(5)), point(json!(6)), point(json!("5"))],
        );

        UserLayerProcessor { user_layer_id: 5 }.process(&mut fc);
        assert_eq!(fc.len(), 2);
        for feature in fc.iter() {
            assert!(!feature.properties.contains_key("user_layer_id"));
            assert!(!feature.properties.contains_key("uuid"));
            assert_eq!(feature.property_text("name").as_deref(), Some("kept"));
        }
    }
}
