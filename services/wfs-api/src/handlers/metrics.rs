//! Health checks and metrics endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use crate::state::AppState;

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
#[instrument(skip(state))]
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let tile_stats = state.tiles.cache().stats();
    let l1_stats = state.l1_cache.stats();
    state.metrics.publish_cache_stats(&tile_stats, &l1_stats);

    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics exporter not installed").into_response(),
    }
}

/// GET /api/stats - counters and cache statistics as JSON
#[instrument(skip(state))]
pub async fn stats_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let tile_stats = state.tiles.cache().stats();
    let l1_stats = state.l1_cache.stats();

    Json(serde_json::json!({
        "service": state.metrics.snapshot(),
        "tile_cache": {
            "hits": tile_stats.hits(),
            "misses": tile_stats.misses(),
            "bypassed": tile_stats.bypassed(),
            "store_errors": tile_stats.store_errors(),
            "writes": tile_stats.writes(),
        },
        "l1_cache": {
            "entries": l1_stats.entry_count(),
            "size_bytes": l1_stats.size_bytes(),
            "hit_rate_percent": l1_stats.hit_rate(),
            "utilization": state.l1_cache.utilization(),
        },
        "layers": state.layers.ids(),
    }))
}
