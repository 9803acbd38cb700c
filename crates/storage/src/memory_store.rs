//! In-memory LRU cache store.
//!
//! This is the L1 tier: sub-millisecond access to recently rendered tiles,
//! placed in front of the shared Redis store.
//!
//! ## Memory-Based Eviction
//!
//! Eviction is driven by memory, not by entry count. When an insert would
//! exceed the configured limit, ~5% of the capacity (by memory) is evicted
//! in LRU order as one batch.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::info;

use crate::cache::{CacheError, CacheStore};

/// LruCache needs an entry bound; memory accounting does the real limiting.
const LRU_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10_000_000) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// In-memory LRU store with memory-based batch eviction and lazy TTL expiry.
pub struct MemoryStore {
    cache: Arc<Mutex<LruCache<Vec<u8>, CachedEntry>>>,
    max_bytes: u64,
    stats: Arc<MemoryStoreStats>,
}

struct CachedEntry {
    data: Bytes,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Statistics for the memory store.
///
/// All fields are atomic for lock-free reads from the metrics endpoint.
#[derive(Default)]
pub struct MemoryStoreStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Entries evicted by the memory limit
    pub evictions: AtomicU64,
    /// Entries dropped on read because their TTL passed
    pub expired: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
    pub eviction_runs: AtomicU64,
}

impl MemoryStoreStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }
}

impl MemoryStore {
    /// Create a store holding at most `max_size_mb` megabytes.
    pub fn new(max_size_mb: usize) -> Self {
        Self::with_max_bytes((max_size_mb as u64) * 1024 * 1024)
    }

    /// Create a store with an exact byte limit.
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(LRU_CAPACITY))),
            max_bytes,
            stats: Arc::new(MemoryStoreStats::default()),
        }
    }

    async fn lookup(&self, key: &[u8]) -> Option<Bytes> {
        let mut cache = self.cache.lock().await;

        let found = cache
            .get(key)
            .map(|entry| (entry.is_expired(), entry.data.clone()));

        match found {
            Some((true, data)) => {
                cache.pop(key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .size_bytes
                    .fetch_sub(data.len() as u64, Ordering::Relaxed);
                self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
                None
            }
            Some((false, data)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn insert(&self, key: &[u8], data: Bytes, ttl: Duration) {
        let size = data.len() as u64;
        if size > self.max_bytes {
            return;
        }

        let mut cache = self.cache.lock().await;

        if let Some(existing) = cache.pop(key) {
            self.stats
                .size_bytes
                .fetch_sub(existing.data.len() as u64, Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
        }

        if self.stats.size_bytes.load(Ordering::Relaxed) + size > self.max_bytes {
            self.evict_batch_locked(&mut cache, size);
        }

        cache.put(
            key.to_vec(),
            CachedEntry {
                data,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Evict at least ~5% of capacity, and enough to fit `incoming` bytes.
    ///
    /// Called with the lock held so the size check and the eviction cannot
    /// race with another writer.
    fn evict_batch_locked(&self, cache: &mut LruCache<Vec<u8>, CachedEntry>, incoming: u64) {
        let current = self.stats.size_bytes.load(Ordering::Relaxed);
        let needed = (current + incoming).saturating_sub(self.max_bytes);
        let target_free = needed.max(self.max_bytes / 20);

        let mut bytes_freed = 0u64;
        let mut entries_evicted = 0u64;
        while bytes_freed < target_free {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    bytes_freed += evicted.data.len() as u64;
                    entries_evicted += 1;
                }
                None => break,
            }
        }

        self.stats.size_bytes.fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(entries_evicted, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(entries_evicted, Ordering::Relaxed);
        self.stats.eviction_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            entries_evicted = entries_evicted,
            bytes_freed_mb = format!("{:.2}", bytes_freed as f64 / (1024.0 * 1024.0)),
            max_size_mb = format!("{:.2}", self.max_bytes as f64 / (1024.0 * 1024.0)),
            "L1 cache batch eviction completed"
        );
    }

    /// Shared handle to the live statistics.
    pub fn stats(&self) -> Arc<MemoryStoreStats> {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.stats.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.stats.entry_count() == 0
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Current utilization ratio (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.stats.size_bytes() as f64 / self.max_bytes as f64
        }
    }

    /// Drop every entry. Hit/miss counters are kept.
    pub async fn clear(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
        self.stats.size_bytes.store(0, Ordering::Relaxed);
        self.stats.entry_count.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, CacheError> {
        Ok(self.lookup(key).await)
    }

    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.insert(key, Bytes::copy_from_slice(value), ttl).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_store_basic_operations() {
        let store = MemoryStore::new(100);

        assert!(store.is_empty());
        assert!(store.get(b"tile1").await.unwrap().is_none());

        store.set(b"tile1", b"test data", MINUTE).await.unwrap();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(b"tile1").await.unwrap();
        assert_eq!(retrieved, Some(Bytes::from_static(b"test data")));

        let stats = store.stats();
        assert_eq!(stats.hits.load(Ordering::Relaxed), 1);
        assert_eq!(stats.misses.load(Ordering::Relaxed), 1);
        assert_eq!(stats.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = MemoryStore::new(100);

        store
            .set(b"tile1", b"test data", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(store.get(b"tile1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(store.get(b"tile1").await.unwrap().is_none());
        let stats = store.stats();
        assert_eq!(stats.expired.load(Ordering::Relaxed), 1);
        assert_eq!(stats.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_served() {
        let store = MemoryStore::new(100);

        store.set(b"tile1", b"data", Duration::ZERO).await.unwrap();
        assert!(store.get(b"tile1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_based_eviction() {
        let store = MemoryStore::new(1);
        let tile_100kb = vec![0u8; 100 * 1024];

        // 15 x 100KB = 1.5MB > 1MB limit
        for i in 0..15 {
            let key = format!("tile{}", i);
            store.set(key.as_bytes(), &tile_100kb, MINUTE).await.unwrap();
        }

        let stats = store.stats();
        assert!(stats.evictions.load(Ordering::Relaxed) > 0);
        assert!(stats.eviction_runs.load(Ordering::Relaxed) > 0);
        assert!(stats.size_bytes() <= 1024 * 1024);

        // Oldest entries go first
        assert!(store.get(b"tile0").await.unwrap().is_none());
        assert!(store.get(b"tile14").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replace_keeps_accounting() {
        let store = MemoryStore::new(100);

        store.set(b"tile1", b"hello", MINUTE).await.unwrap();
        store.set(b"tile2", b"world!", MINUTE).await.unwrap();
        assert_eq!(store.stats().size_bytes(), 11);

        store.set(b"tile1", b"hello world", MINUTE).await.unwrap();
        assert_eq!(store.stats().size_bytes(), 17);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_utilization_and_clear() {
        let store = MemoryStore::new(1);
        assert_eq!(store.utilization(), 0.0);

        store.set(b"tile1", &vec![0u8; 512 * 1024], MINUTE).await.unwrap();
        assert!((store.utilization() - 0.5).abs() < 0.01);

        store.clear().await;
        assert!(store.is_empty());
        assert_eq!(store.stats().size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_oversized_entry_is_not_stored() {
        let store = MemoryStore::with_max_bytes(10);
        store.set(b"big", &[1u8; 11], MINUTE).await.unwrap();
        assert!(store.is_empty());
    }
}
