//! Tile endpoint.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use renderer::png;
use wfs_common::layer::STYLE_DEFAULT;
use wfs_common::MapError;

use super::common::{user_id, ApiError};
use crate::state::AppState;
use crate::tiles::{TileRequest, DEFAULT_TILE_SIZE};

/// Query parameters of `GET /tiles/:layer`.
#[derive(Debug, Default, Deserialize)]
pub struct TileQueryParams {
    pub bbox: Option<String>,
    pub srs: Option<String>,
    pub zoom: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub style: Option<String>,
    pub highlight: Option<String>,
    pub client: Option<String>,
    pub persistent: Option<bool>,
    pub format: Option<String>,
}

impl TileQueryParams {
    pub fn into_request(self, layer_id: String, user_id: String) -> Result<TileRequest, MapError> {
        let bbox = self
            .bbox
            .ok_or_else(|| MapError::MissingParameter("bbox".to_string()))?;

        Ok(TileRequest {
            layer_id,
            style_name: self.style.unwrap_or_else(|| STYLE_DEFAULT.to_string()),
            highlight: self.highlight.filter(|h| !h.is_empty()),
            client_id: self.client.filter(|c| !c.is_empty()),
            user_id,
            crs_code: self.srs.unwrap_or_else(|| "EPSG:3857".to_string()),
            bbox,
            zoom: self.zoom.unwrap_or(0),
            width: self.width.unwrap_or(DEFAULT_TILE_SIZE),
            height: self.height.unwrap_or(DEFAULT_TILE_SIZE),
            persistent: self.persistent.unwrap_or(true),
        })
    }
}

/// GET /tiles/:layer - render a PNG tile
#[instrument(skip(state, headers))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer_id): Path<String>,
    Query(params): Query<TileQueryParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.metrics.record_tile_request();

    let as_text = match params.format.as_deref() {
        None | Some("png") => false,
        Some("base64") => true,
        Some(other) => {
            return Err(MapError::InvalidInput(format!("Unsupported format: {}", other)).into())
        }
    };

    let request = params.into_request(layer_id, user_id(&headers))?;
    let tile = state.tiles.render_tile(&request).await?;
    let cache_status = if tile.from_cache { "HIT" } else { "MISS" };

    if as_text {
        let body = Json(json!({ "image": png::to_text_safe(&tile.png) }));
        return Ok(([("x-cache", cache_status)], body).into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::HeaderName::from_static("x-cache"), cache_status),
        ],
        tile.png,
    )
        .into_response())
}
