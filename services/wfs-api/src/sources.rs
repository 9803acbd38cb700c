//! Feature sources: where the features of a layer come from.
//!
//! - `WfsHttpSource`: remote WFS GetFeature with a GeoJSON output format
//! - `FileSource`: GeoJSON file stored in the layer's native CRS
//! - `LayerSourceRouter`: picks one of the above from the layer descriptor

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use wfs_common::crs::{Crs, CrsParseError, CrsProvider};
use wfs_common::feature::FeatureCollection;
use wfs_common::layer::{LayerDescriptor, LayerSource};
use wfs_common::BoundingBox;

/// Errors raised by feature sources. They never reach clients directly.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream responded with status {0}")]
    Status(u16),

    #[error("Response is not a GeoJSON feature collection: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Projection(#[from] CrsParseError),

    #[error("Feature retrieval timed out after {0:?}")]
    Timeout(Duration),
}

/// One feature retrieval.
#[derive(Debug, Clone, Copy)]
pub struct FeatureQuery<'a> {
    pub layer_id: &'a str,
    pub user_id: &'a str,
    pub layer: &'a LayerDescriptor,
    /// Requested area, in `crs`
    pub bbox: BoundingBox,
    /// Target CRS of the returned features
    pub crs: &'a Crs,
}

/// Capability to retrieve the features of a layer within a bbox.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn get_features(&self, query: &FeatureQuery<'_>)
        -> Result<FeatureCollection, SourceError>;
}

/// Record the layer's geometry property on every feature so that style
/// rules restricted to a geometry property match.
fn tag_geometry_name(fc: &mut FeatureCollection, layer: &LayerDescriptor) {
    for feature in &mut fc.features {
        feature.geometry_name.clone_from(&layer.geometry_property);
    }
}

/// Remote WFS endpoint.
#[derive(Debug, Clone, Default)]
pub struct WfsHttpSource {
    client: reqwest::Client,
}

impl WfsHttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Query parameters of a GetFeature request.
    pub fn query_params(
        feature_type: &str,
        version: &str,
        bbox: &BoundingBox,
        crs: &Crs,
    ) -> Vec<(&'static str, String)> {
        let srs = crs.code.to_string();
        vec![
            ("service", "WFS".to_string()),
            ("version", version.to_string()),
            ("request", "GetFeature".to_string()),
            ("typeName", feature_type.to_string()),
            ("outputFormat", "application/json".to_string()),
            ("srsName", srs.clone()),
            (
                "bbox",
                format!(
                    "{},{},{},{},{}",
                    bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y, srs
                ),
            ),
        ]
    }
}

#[async_trait]
impl FeatureSource for WfsHttpSource {
    #[instrument(skip(self, query), fields(layer = query.layer_id))]
    async fn get_features(
        &self,
        query: &FeatureQuery<'_>,
    ) -> Result<FeatureCollection, SourceError> {
        let LayerSource::Wfs {
            url,
            feature_type,
            version,
        } = &query.layer.source
        else {
            return Ok(FeatureCollection::new(query.crs.code));
        };

        let params = Self::query_params(feature_type, version, &query.bbox, query.crs);
        let response = self.client.get(url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let mut fc = FeatureCollection::from_geojson(&body, query.crs.code)?;
        tag_geometry_name(&mut fc, query.layer);

        debug!(features = fc.len(), bytes = body.len(), "Fetched WFS features");
        Ok(fc)
    }
}

/// GeoJSON files on local disk.
#[derive(Clone)]
pub struct FileSource {
    crs_provider: Arc<dyn CrsProvider>,
}

impl FileSource {
    pub fn new(crs_provider: Arc<dyn CrsProvider>) -> Self {
        Self { crs_provider }
    }
}

#[async_trait]
impl FeatureSource for FileSource {
    #[instrument(skip(self, query), fields(layer = query.layer_id))]
    async fn get_features(
        &self,
        query: &FeatureQuery<'_>,
    ) -> Result<FeatureCollection, SourceError> {
        let LayerSource::File { path, crs } = &query.layer.source else {
            return Ok(FeatureCollection::new(query.crs.code));
        };

        let native = self.crs_provider.lookup(crs)?;
        let target = query.crs.code;

        let data = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let mut fc = FeatureCollection::from_geojson(&data, native.code)?;

        let native_bbox = self
            .crs_provider
            .transform_bbox(&query.bbox, target, native.code)?;
        fc.retain_within(&native_bbox);

        for feature in &mut fc.features {
            if let Some(geometry) = &feature.geometry {
                feature.geometry = Some(self.crs_provider.transform_geometry(
                    geometry,
                    native.code,
                    target,
                )?);
            }
        }
        fc.crs = target;
        tag_geometry_name(&mut fc, query.layer);

        debug!(features = fc.len(), native = %native.code, "Read file features");
        Ok(fc)
    }
}

/// Dispatches each query to the source the layer is configured with.
#[derive(Clone)]
pub struct LayerSourceRouter {
    wfs: Arc<dyn FeatureSource>,
    file: Arc<dyn FeatureSource>,
}

impl LayerSourceRouter {
    pub fn new(wfs: Arc<dyn FeatureSource>, file: Arc<dyn FeatureSource>) -> Self {
        Self { wfs, file }
    }

    /// Router over an HTTP client and the given CRS provider.
    pub fn standard(client: reqwest::Client, crs_provider: Arc<dyn CrsProvider>) -> Self {
        Self::new(
            Arc::new(WfsHttpSource::new(client)),
            Arc::new(FileSource::new(crs_provider)),
        )
    }
}

#[async_trait]
impl FeatureSource for LayerSourceRouter {
    async fn get_features(
        &self,
        query: &FeatureQuery<'_>,
    ) -> Result<FeatureCollection, SourceError> {
        match query.layer.source {
            LayerSource::Wfs { .. } => self.wfs.get_features(query).await,
            LayerSource::File { .. } => self.file.get_features(query).await,
        }
    }
}
