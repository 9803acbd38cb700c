//! Tile rendering orchestration.
//!
//! style resolution -> cache lookup -> feature retrieval -> rasterize ->
//! encode -> cache store.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use renderer::png;
use renderer::raster::{DrawRequest, Rasterizer, RenderError};
use renderer::resolver::{resolve_style, StyleKind, StyleResolution};
use renderer::template::CustomStyleValues;
use storage::{CustomStyleStore, TileCache, TileKey};
use wfs_common::{MapError, MapResult};

use crate::gateway::{content_processor_for, ContentProcessor, FeatureGateway};
use crate::layer_config::LayerRegistry;
use crate::metrics::MetricsCollector;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest accepted tile edge in pixels.
pub const MAX_TILE_SIZE: u32 = 4096;

/// One tile request, as parsed from the HTTP layer.
#[derive(Debug, Clone)]
pub struct TileRequest {
    pub layer_id: String,
    pub style_name: String,
    /// Set when the tile shows selected features
    pub highlight: Option<String>,
    pub client_id: Option<String>,
    pub user_id: String,
    pub crs_code: String,
    /// Raw `x1,y1,x2,y2`
    pub bbox: String,
    pub zoom: i64,
    pub width: u32,
    pub height: u32,
    pub persistent: bool,
}

/// A rendered (or cached) PNG tile.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub png: Bytes,
    pub from_cache: bool,
}

/// Renders tiles and keeps the tile cache up to date.
#[derive(Clone)]
pub struct TileService {
    layers: Arc<LayerRegistry>,
    gateway: FeatureGateway,
    cache: TileCache,
    custom_styles: CustomStyleStore,
    rasterizer: Arc<Rasterizer>,
    metrics: Arc<MetricsCollector>,
}

impl TileService {
    pub fn new(
        layers: Arc<LayerRegistry>,
        gateway: FeatureGateway,
        cache: TileCache,
        custom_styles: CustomStyleStore,
        rasterizer: Arc<Rasterizer>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            layers,
            gateway,
            cache,
            custom_styles,
            rasterizer,
            metrics,
        }
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Registered custom values of a client, `None` when missing or unreadable.
    async fn custom_values(&self, client_id: &str, layer_id: &str) -> Option<CustomStyleValues> {
        match self.custom_styles.load(client_id, layer_id).await {
            Ok(values) => values,
            Err(e) => {
                warn!(client = client_id, layer = layer_id, error = %e, "Failed to load custom style");
                None
            }
        }
    }

    #[instrument(skip(self, request), fields(layer = %request.layer_id, style = %request.style_name))]
    pub async fn render_tile(&self, request: &TileRequest) -> MapResult<RenderedTile> {
        if request.width == 0 || request.height == 0 {
            return Err(MapError::InvalidInput("Invalid tile size".to_string()));
        }
        if request.width > MAX_TILE_SIZE || request.height > MAX_TILE_SIZE {
            return Err(MapError::InvalidInput(format!(
                "Tile size exceeds {}",
                MAX_TILE_SIZE
            )));
        }

        let layer = self
            .layers
            .get(&request.layer_id)
            .ok_or_else(|| MapError::LayerNotFound(request.layer_id.clone()))?;
        let crs = self.gateway.lookup_crs(&request.crs_code)?;
        let bbox = self.gateway.validate_bbox(&request.bbox, &crs)?;

        let kind = StyleKind::classify(
            &request.style_name,
            request.highlight.as_deref(),
            request.client_id.as_deref(),
        );
        let custom_values = match &kind {
            StyleKind::Custom { client_id, .. } => {
                self.custom_values(client_id, &request.layer_id).await
            }
            _ => None,
        };
        let style = match resolve_style(layer, &kind, custom_values.as_ref()) {
            StyleResolution::Resolved(style) => style,
            StyleResolution::Unresolved => {
                self.metrics.record_render_failure("style");
                return Err(MapError::StyleUnresolved(request.style_name.clone()));
            }
        };

        // Highlight tiles share the key of the plain style, so they are never cached.
        let cacheable = request.highlight.is_none();
        let key = TileKey::new(
            request.layer_id.as_str(),
            request.style_name.as_str(),
            crs.code.to_string(),
            bbox,
            request.zoom,
            request.persistent,
        );

        if cacheable {
            if let Some(png) = self.cache.get(&key).await {
                debug!(key = %key, "Tile served from cache");
                return Ok(RenderedTile {
                    png,
                    from_cache: true,
                });
            }
        }

        let processor = content_processor_for(&layer.id);
        let features = self
            .gateway
            .fetch_features(
                &request.layer_id,
                &request.user_id,
                layer,
                bbox,
                &crs,
                processor.as_ref().map(|p| p as &dyn ContentProcessor),
            )
            .await?;

        let started = Instant::now();
        let rasterizer = Arc::clone(&self.rasterizer);
        let (width, height) = (request.width, request.height);
        let code = crs.code;
        let encoded = tokio::task::spawn_blocking(move || {
            let image = rasterizer.draw(&DrawRequest {
                crs: code,
                width: Some(width),
                height: Some(height),
                location: Some(bbox),
                style: Some(&style),
                features: &features,
            })?;
            Ok::<_, RenderError>(png::encode(&image))
        })
        .await
        .map_err(|e| MapError::InternalError(format!("Render task failed: {}", e)))?;

        let png = match encoded {
            Ok(Some(png)) => Bytes::from(png),
            Ok(None) => {
                self.metrics.record_render_failure("encode");
                return Err(MapError::EncodingFailure);
            }
            Err(e) => {
                self.metrics.record_render_failure("render");
                return Err(MapError::RenderError(e.to_string()));
            }
        };
        self.metrics.record_render(started.elapsed());

        if cacheable {
            self.cache.set(&key, &png).await;
        }

        Ok(RenderedTile {
            png,
            from_cache: false,
        })
    }
}
