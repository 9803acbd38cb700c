//! HTTP request handlers.
//!
//! - `tiles`: rendered PNG tiles (binary or base64)
//! - `features`: GeoJSON features within a bbox
//! - `styles`: per-client custom style registration
//! - `metrics`: health check and Prometheus metrics
//! - `common`: error responses and shared request helpers

pub mod common;
pub mod features;
pub mod metrics;
pub mod styles;
pub mod tiles;

pub use common::{user_id, ApiError, USER_ID_HEADER};
pub use features::{features_handler, FeatureQueryParams};
pub use metrics::{health_handler, metrics_handler, stats_handler};
pub use styles::{get_style_handler, put_style_handler};
pub use tiles::{tile_handler, TileQueryParams};
