//! Error responses and helpers shared by the handlers.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error as _;
use tracing::{debug, error, warn};

use wfs_common::MapError;

/// Header carrying the id of the requesting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// User id of the request, `guest` when absent.
pub fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("guest")
        .to_string()
}

/// A [`MapError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub MapError);

impl From<MapError> for ApiError {
    fn from(err: MapError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &err {
            MapError::InternalError(_)
            | MapError::CacheUnavailable(_)
            | MapError::RenderError(_)
            | MapError::ProjectionError(_) => {
                error!(error = %err, "Request failed");
                "Internal server error".to_string()
            }
            MapError::RetrievalFailure(cause) => {
                warn!(error = %err, cause = %cause, "Feature retrieval failed");
                err.to_string()
            }
            _ => err.to_string(),
        };

        if let Some(source) = err.source() {
            debug!(source = %source, "Error source");
        }

        (
            status,
            Json(json!({
                "error": message,
                "code": err.error_code(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_defaults_to_guest() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id(&headers), "guest");

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(user_id(&headers), "guest");

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-42"));
        assert_eq!(user_id(&headers), "u-42");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (MapError::invalid_bbox(), StatusCode::BAD_REQUEST),
            (MapError::bbox_out_of_extent(), StatusCode::BAD_REQUEST),
            (MapError::LayerNotFound("x".into()), StatusCode::NOT_FOUND),
            (MapError::StyleUnresolved("x".into()), StatusCode::NOT_FOUND),
            (MapError::EncodingFailure, StatusCode::INTERNAL_SERVER_ERROR),
            (
                MapError::retrieval(std::io::Error::other("down")),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
