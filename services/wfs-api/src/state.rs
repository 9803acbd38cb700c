//! Application state and shared resources.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use renderer::{LabelFont, Rasterizer};
use storage::{CacheStore, CustomStyleStore, MemoryStore, RedisStore, TieredStore, TileCache, TileCacheConfig};
use wfs_common::{BuiltinCrsProvider, CrsProvider};

use crate::config::Args;
use crate::gateway::FeatureGateway;
use crate::layer_config::LayerRegistry;
use crate::metrics::MetricsCollector;
use crate::sources::{FeatureSource, LayerSourceRouter};
use crate::tiles::TileService;

/// Tunables of the shared services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub tile_cache: TileCacheConfig,
    pub custom_style_ttl: Duration,
    pub fetch_timeout: Duration,
    /// TTL of entries promoted from L2 into L1
    pub l1_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tile_cache: TileCacheConfig::default(),
            custom_style_ttl: Duration::from_secs(86400),
            fetch_timeout: Duration::from_secs(30),
            l1_ttl: Duration::from_secs(300),
        }
    }
}

impl From<&Args> for ServiceSettings {
    fn from(args: &Args) -> Self {
        Self {
            tile_cache: args.tile_cache_config(),
            custom_style_ttl: Duration::from_secs(args.custom_style_ttl_secs),
            fetch_timeout: args.fetch_timeout(),
            l1_ttl: Duration::from_secs(args.l1_cache_ttl_secs),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub layers: Arc<LayerRegistry>,
    pub gateway: FeatureGateway,
    pub tiles: TileService,
    pub custom_styles: CustomStyleStore,
    pub l1_cache: Arc<MemoryStore>,
    pub metrics: Arc<MetricsCollector>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the services together over the given stores and feature source.
    pub fn new(
        layers: LayerRegistry,
        l1_cache: Arc<MemoryStore>,
        l2_cache: Option<Arc<dyn CacheStore>>,
        source: Arc<dyn FeatureSource>,
        rasterizer: Rasterizer,
        settings: ServiceSettings,
    ) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(TieredStore::new(
            Arc::clone(&l1_cache),
            l2_cache,
            settings.l1_ttl,
        ));

        let layers = Arc::new(layers);
        let crs_provider: Arc<dyn CrsProvider> = Arc::new(BuiltinCrsProvider);
        let gateway =
            FeatureGateway::new(source, crs_provider).with_fetch_timeout(settings.fetch_timeout);
        let custom_styles = CustomStyleStore::new(Arc::clone(&store), settings.custom_style_ttl);
        let metrics = Arc::new(MetricsCollector::new());

        let tiles = TileService::new(
            Arc::clone(&layers),
            gateway.clone(),
            TileCache::new(store, settings.tile_cache),
            custom_styles.clone(),
            Arc::new(rasterizer),
            Arc::clone(&metrics),
        );

        Self {
            layers,
            gateway,
            tiles,
            custom_styles,
            l1_cache,
            metrics,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Build the production state from configuration.
    pub async fn from_args(args: &Args) -> Result<Self> {
        let layers = LayerRegistry::load_from_file(&args.layers_config);
        if layers.is_empty() {
            warn!(path = ?args.layers_config, "No layers configured");
        }

        let l1_cache = Arc::new(MemoryStore::new(args.l1_cache_size_mb));
        let l2_cache: Option<Arc<dyn CacheStore>> = match &args.redis_url {
            Some(url) => match RedisStore::connect(url).await {
                Ok(store) => Some(Arc::new(store) as Arc<dyn CacheStore>),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, using in-memory cache only");
                    None
                }
            },
            None => {
                info!("REDIS_URL not set, using in-memory cache only");
                None
            }
        };

        let font = match &args.label_font_path {
            Some(path) => match LabelFont::from_file(path) {
                Ok(Some(font)) => Some(font),
                Ok(None) => {
                    warn!(path = ?path, "Label font is not a valid TrueType font");
                    None
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to read label font");
                    None
                }
            },
            None => None,
        };
        if font.is_none() {
            info!("No label font loaded, labels will be skipped");
        }

        let crs_provider: Arc<dyn CrsProvider> = Arc::new(BuiltinCrsProvider);
        let client = reqwest::Client::builder()
            .timeout(args.fetch_timeout())
            .build()?;
        let source = Arc::new(LayerSourceRouter::standard(client, crs_provider));

        Ok(Self::new(
            layers,
            l1_cache,
            l2_cache,
            source,
            Rasterizer::new(font),
            ServiceSettings::from(args),
        ))
    }
}
