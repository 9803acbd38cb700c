//! Service configuration from command line arguments and environment.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use storage::TileCacheConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "wfs-api")]
#[command(about = "Vector feature tile and GeoJSON server")]
pub struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Redis URL for the shared tile cache. Without it only the in-process
    /// memory tier is used.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// In-process (L1) cache size in megabytes
    #[arg(long, env = "L1_CACHE_SIZE_MB", default_value_t = 256)]
    pub l1_cache_size_mb: usize,

    /// Maximum lifetime of an L1 entry in seconds
    #[arg(long, env = "L1_CACHE_TTL_SECS", default_value_t = 300)]
    pub l1_cache_ttl_secs: u64,

    /// Lifetime of persistent tile cache entries in seconds
    #[arg(long, env = "TILE_CACHE_TTL_SECS", default_value_t = 86400)]
    pub tile_cache_ttl_secs: u64,

    /// Lifetime of temporary tile cache entries in seconds
    #[arg(long, env = "TILE_CACHE_TEMP_TTL_SECS", default_value_t = 3600)]
    pub tile_cache_temp_ttl_secs: u64,

    /// Lifetime of registered custom styles in seconds
    #[arg(long, env = "CUSTOM_STYLE_TTL_SECS", default_value_t = 86400)]
    pub custom_style_ttl_secs: u64,

    /// Layer registry file
    #[arg(long, env = "LAYERS_CONFIG", default_value = "config/layers.yaml")]
    pub layers_config: PathBuf,

    /// TrueType font used for feature labels
    #[arg(long, env = "LABEL_FONT_PATH")]
    pub label_font_path: Option<PathBuf>,

    /// Timeout for feature retrieval in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,
}

impl Args {
    pub fn tile_cache_config(&self) -> TileCacheConfig {
        TileCacheConfig {
            persistent_ttl: Duration::from_secs(self.tile_cache_ttl_secs),
            temp_ttl: Duration::from_secs(self.tile_cache_temp_ttl_secs),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["wfs-api"]);
        assert_eq!(args.listen, "0.0.0.0:8080");
        assert_eq!(args.l1_cache_size_mb, 256);
        assert_eq!(args.fetch_timeout(), Duration::from_secs(30));

        let cache = args.tile_cache_config();
        assert_eq!(cache.persistent_ttl, Duration::from_secs(86400));
        assert_eq!(cache.temp_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "wfs-api",
            "--redis-url",
            "redis://cache:6379",
            "--tile-cache-temp-ttl-secs",
            "60",
        ]);
        assert_eq!(args.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(args.tile_cache_config().temp_ttl, Duration::from_secs(60));
    }
}
