//! Tile cache: key model and caching policy over a [`CacheStore`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use wfs_common::layer::CUSTOM_STYLE_PREFIX;
use wfs_common::BoundingBox;

use crate::cache::CacheStore;

/// Prefix of every rendered tile key.
pub const TILE_KEY_PREFIX: &str = "WFSImage";

const TEMP_SUFFIX: &str = "_temp";

/// True when `style_name` denotes a per-client custom style.
pub fn is_custom_style(style_name: &str) -> bool {
    style_name.starts_with(CUSTOM_STYLE_PREFIX)
}

/// Cache key for a rendered tile.
///
/// Rendered as `WFSImage_<layer>_<style>_<crs>_<minX>-<minY>-<maxX>-<maxY>_<zoom>[_temp]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileKey {
    pub layer_id: String,
    pub style_name: String,
    pub crs_code: String,
    pub bbox: BoundingBox,
    pub zoom: i64,
    pub persistent: bool,
}

impl TileKey {
    pub fn new(
        layer_id: impl Into<String>,
        style_name: impl Into<String>,
        crs_code: impl Into<String>,
        bbox: BoundingBox,
        zoom: i64,
        persistent: bool,
    ) -> Self {
        Self {
            layer_id: layer_id.into(),
            style_name: style_name.into(),
            crs_code: crs_code.into(),
            bbox,
            zoom,
            persistent,
        }
    }

    pub fn is_custom_style(&self) -> bool {
        is_custom_style(&self.style_name)
    }
}

/// Escape the key delimiter so string fields cannot shift field boundaries.
pub(crate) fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(['_', '%']) {
        Cow::Owned(field.replace('%', "%25").replace('_', "%5F"))
    } else {
        Cow::Borrowed(field)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}",
            TILE_KEY_PREFIX,
            escape_field(&self.layer_id),
            escape_field(&self.style_name),
            escape_field(&self.crs_code),
            self.bbox.cache_key(),
            self.zoom
        )?;
        if !self.persistent {
            f.write_str(TEMP_SUFFIX)?;
        }
        Ok(())
    }
}

/// Lifetimes of cached tiles.
#[derive(Debug, Clone, Copy)]
pub struct TileCacheConfig {
    pub persistent_ttl: Duration,
    pub temp_ttl: Duration,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            persistent_ttl: Duration::from_secs(86400),
            temp_ttl: Duration::from_secs(3600),
        }
    }
}

/// Outcome counters of the tile cache.
#[derive(Debug, Default)]
pub struct TileCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Calls skipped because the style is client specific
    pub bypassed: AtomicU64,
    /// Store failures absorbed as misses or skipped writes
    pub store_errors: AtomicU64,
    pub writes: AtomicU64,
}

impl TileCacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn bypassed(&self) -> u64 {
        self.bypassed.load(Ordering::Relaxed)
    }

    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Rendered tile cache.
///
/// Never fails: store errors degrade to a miss on read and a skipped write,
/// and custom styles are neither read nor written.
#[derive(Clone)]
pub struct TileCache {
    store: Arc<dyn CacheStore>,
    config: TileCacheConfig,
    stats: Arc<TileCacheStats>,
}

impl TileCache {
    pub fn new(store: Arc<dyn CacheStore>, config: TileCacheConfig) -> Self {
        Self {
            store,
            config,
            stats: Arc::new(TileCacheStats::default()),
        }
    }

    /// Lifetime of an entry written under `key`.
    pub fn ttl_for(&self, key: &TileKey) -> Duration {
        if key.persistent {
            self.config.persistent_ttl
        } else {
            self.config.temp_ttl
        }
    }

    /// Fetch a cached tile.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        if key.is_custom_style() {
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let key_str = key.to_string();
        match self.store.get(key_str.as_bytes()).await {
            Ok(Some(data)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key_str, size = data.len(), "Tile cache hit");
                Some(data)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key_str, error = %e, "Tile cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a rendered tile with the TTL of its persistence class.
    pub async fn set(&self, key: &TileKey, data: &[u8]) {
        if key.is_custom_style() {
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let key_str = key.to_string();
        let ttl = self.ttl_for(key);
        match self.store.set(key_str.as_bytes(), data, ttl).await {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key_str, ttl_secs = ttl.as_secs(), "Tile cached");
            }
            Err(e) => {
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key_str, error = %e, "Tile cache write failed, skipping");
            }
        }
    }

    pub fn stats(&self) -> Arc<TileCacheStats> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(persistent: bool) -> TileKey {
        TileKey::new(
            "42",
            "default",
            "EPSG:3067",
            BoundingBox::new(385000.0, 6672000.0, 386024.0, 6673024.0),
            9,
            persistent,
        )
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            key(true).to_string(),
            "WFSImage_42_default_EPSG:3067_385000.0-6672000.0-386024.0-6673024.0_9"
        );
        assert_eq!(
            key(false).to_string(),
            "WFSImage_42_default_EPSG:3067_385000.0-6672000.0-386024.0-6673024.0_9_temp"
        );
    }

    #[test]
    fn test_delimiters_in_fields_are_escaped() {
        let a = TileKey::new("a_b", "c", "EPSG:3857", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, true);
        let b = TileKey::new("a", "b_c", "EPSG:3857", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, true);
        assert_ne!(a.to_string(), b.to_string());
        assert!(a.to_string().starts_with("WFSImage_a%5Fb_c_"));
    }

    #[test]
    fn test_temp_style_name_does_not_collide_with_temp_suffix() {
        // A persistent key never ends with the bare temp marker
        let persistent = TileKey::new("l", "s", "c", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, true);
        let temp = TileKey::new("l", "s", "c", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, false);
        assert_ne!(persistent.to_string(), temp.to_string());
    }

    #[test]
    fn test_custom_style_detection() {
        assert!(is_custom_style("oskari_custom"));
        assert!(is_custom_style("oskari_custom_client7"));
        assert!(!is_custom_style("default"));
        assert!(!is_custom_style("my_oskari_custom"));
    }
}
