//! Storage abstractions for the feature tile services.
//!
//! Provides:
//! - A minimal byte-oriented cache capability (`CacheStore`)
//! - Redis and in-memory LRU implementations, and a tiered L1/L2 composition
//! - The tile cache key model and caching policy
//! - Per-client custom style storage

pub mod cache;
pub mod custom_style;
pub mod memory_store;
pub mod redis_store;
pub mod tiered;
pub mod tile_cache;

pub use cache::{CacheError, CacheStore};
pub use custom_style::CustomStyleStore;
pub use memory_store::{MemoryStore, MemoryStoreStats};
pub use redis_store::RedisStore;
pub use tiered::TieredStore;
pub use tile_cache::{
    is_custom_style, TileCache, TileCacheConfig, TileCacheStats, TileKey, TILE_KEY_PREFIX,
};
