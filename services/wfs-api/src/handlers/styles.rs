//! Custom style registration.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use renderer::template::CustomStyleValues;
use wfs_common::MapError;

use super::common::ApiError;
use crate::state::AppState;

/// PUT /styles/:client/:layer - register a client's custom style values
#[instrument(skip(state, values))]
pub async fn put_style_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((client_id, layer_id)): Path<(String, String)>,
    Json(values): Json<CustomStyleValues>,
) -> Result<Response, ApiError> {
    if state.layers.get(&layer_id).is_none() {
        return Err(MapError::LayerNotFound(layer_id).into());
    }
    values
        .validate()
        .map_err(|e| MapError::InvalidInput(e.to_string()))?;

    state
        .custom_styles
        .save(&client_id, &layer_id, &values)
        .await
        .map_err(MapError::from)?;

    info!(client = %client_id, layer = %layer_id, "Custom style registered");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /styles/:client/:layer - a client's registered custom style values
#[instrument(skip(state))]
pub async fn get_style_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((client_id, layer_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let values: Option<CustomStyleValues> = state
        .custom_styles
        .load(&client_id, &layer_id)
        .await
        .map_err(MapError::from)?;

    match values {
        Some(values) => Ok(Json(values).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "No custom style registered" })),
        )
            .into_response()),
    }
}
