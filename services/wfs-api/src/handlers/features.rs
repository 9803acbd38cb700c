//! GeoJSON feature endpoint.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};

use wfs_common::geojson::{write_feature_collection, GEOJSON_CONTENT_TYPE};
use wfs_common::precision::decimals_for;
use wfs_common::MapError;

use super::common::{user_id, ApiError};
use crate::gateway::{content_processor_for, ContentProcessor};
use crate::state::AppState;

/// Query parameters of `GET /features/:layer`.
#[derive(Debug, Deserialize)]
pub struct FeatureQueryParams {
    pub bbox: Option<String>,
    pub srs: Option<String>,
}

/// GET /features/:layer - features within a bbox as GeoJSON
#[instrument(skip(state, headers))]
pub async fn features_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer_id): Path<String>,
    Query(params): Query<FeatureQueryParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.metrics.record_feature_request();

    let raw_bbox = params
        .bbox
        .ok_or_else(|| MapError::MissingParameter("bbox".to_string()))?;
    let layer = state
        .layers
        .get(&layer_id)
        .ok_or_else(|| MapError::LayerNotFound(layer_id.clone()))?;

    let srs = params.srs.as_deref().unwrap_or("EPSG:3857");
    let crs = state.gateway.lookup_crs(srs)?;
    let bbox = state.gateway.validate_bbox(&raw_bbox, &crs)?;

    let processor = content_processor_for(&layer.id);
    let fc = state
        .gateway
        .fetch_features(
            &layer_id,
            &user_id(&headers),
            layer,
            bbox,
            &crs,
            processor.as_ref().map(|p| p as &dyn ContentProcessor),
        )
        .await?;

    let body = write_feature_collection(&fc, decimals_for(&crs)).map_err(|e| {
        error!(layer = %layer_id, error = %e, "Failed to write GeoJSON");
        MapError::InternalError("Failed to write GeoJSON".to_string())
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE)],
        body,
    )
        .into_response())
}
