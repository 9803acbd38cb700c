//! Feature tile service library.
//!
//! This module exposes the internal modules for testing purposes.

pub mod config;
pub mod gateway;
pub mod handlers;
pub mod layer_config;
pub mod metrics;
pub mod sources;
pub mod state;
pub mod tiles;

use axum::{
    extract::Extension,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router over shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tiles and features
        .route("/tiles/:layer", get(handlers::tile_handler))
        .route("/features/:layer", get(handlers::features_handler))
        // Custom styles
        .route(
            "/styles/:client/:layer",
            get(handlers::get_style_handler).put(handlers::put_style_handler),
        )
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/stats", get(handlers::stats_handler))
        // Layer extensions
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
