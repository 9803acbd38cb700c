//! Two-tier cache store: in-memory L1 in front of a shared L2.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheError, CacheStore};
use crate::memory_store::MemoryStore;

/// L1 memory store with an optional shared L2 (normally Redis).
///
/// Reads fall through to L2 and promote hits into L1. Writes go to both
/// tiers. An L2 error is only returned when L1 could not serve the call.
///
/// With an L2, L1 copies live at most `l1_ttl`. Without one, L1 is the
/// store of record and keeps every entry for its full write TTL.
pub struct TieredStore {
    l1: Arc<MemoryStore>,
    l2: Option<Arc<dyn CacheStore>>,
    l1_ttl: Duration,
}

impl TieredStore {
    pub fn new(l1: Arc<MemoryStore>, l2: Option<Arc<dyn CacheStore>>, l1_ttl: Duration) -> Self {
        Self { l1, l2, l1_ttl }
    }

    /// Memory-only store.
    pub fn memory_only(l1: Arc<MemoryStore>) -> Self {
        Self::new(l1, None, Duration::ZERO)
    }

    /// Lifetime of the L1 copy of an entry written with `ttl`.
    fn l1_ttl_for(&self, ttl: Duration) -> Duration {
        if self.l2.is_some() {
            ttl.min(self.l1_ttl)
        } else {
            ttl
        }
    }

    pub fn l1(&self) -> &Arc<MemoryStore> {
        &self.l1
    }

    pub fn has_l2(&self) -> bool {
        self.l2.is_some()
    }
}

#[async_trait]
impl CacheStore for TieredStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, CacheError> {
        if let Some(data) = self.l1.get(key).await? {
            return Ok(Some(data));
        }

        let Some(l2) = &self.l2 else {
            return Ok(None);
        };

        let found = l2.get(key).await?;
        if let Some(data) = &found {
            debug!(size = data.len(), "Promoting L2 hit into L1");
            self.l1.set(key, data, self.l1_ttl).await?;
        }
        Ok(found)
    }

    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.l1.set(key, value, self.l1_ttl_for(ttl)).await?;

        match &self.l2 {
            Some(l2) => l2.set(key, value, ttl).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CustomStyleStore;

    const MINUTE: Duration = Duration::from_secs(60);

    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &[u8]) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::Get("connection reset".to_string()))
        }

        async fn set(&self, _key: &[u8], _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Set("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_l2_hit_is_promoted() {
        let l1 = Arc::new(MemoryStore::new(10));
        let l2 = Arc::new(MemoryStore::new(10));
        l2.set(b"tile", b"png", MINUTE).await.unwrap();

        let store = TieredStore::new(l1.clone(), Some(l2), MINUTE);
        assert_eq!(store.get(b"tile").await.unwrap(), Some(Bytes::from_static(b"png")));

        assert_eq!(l1.get(b"tile").await.unwrap(), Some(Bytes::from_static(b"png")));
    }

    #[tokio::test]
    async fn test_writes_reach_both_tiers() {
        let l1 = Arc::new(MemoryStore::new(10));
        let l2 = Arc::new(MemoryStore::new(10));
        let store = TieredStore::new(l1.clone(), Some(l2.clone()), MINUTE);

        store.set(b"tile", b"png", MINUTE).await.unwrap();
        assert!(l1.get(b"tile").await.unwrap().is_some());
        assert!(l2.get(b"tile").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_l1_serves_when_l2_fails() {
        let l1 = Arc::new(MemoryStore::new(10));
        let store = TieredStore::new(l1, Some(Arc::new(FailingStore)), MINUTE);

        assert!(store.set(b"tile", b"png", MINUTE).await.is_err());
        assert_eq!(store.get(b"tile").await.unwrap(), Some(Bytes::from_static(b"png")));
        assert!(store.get(b"other").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_only_keeps_write_ttl() {
        let store = TieredStore::new(Arc::new(MemoryStore::new(10)), None, Duration::from_millis(50));

        store.set(b"tile", b"png", Duration::from_secs(3600)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.get(b"tile").await.unwrap(), Some(Bytes::from_static(b"png")));
    }

    #[tokio::test]
    async fn test_l1_copy_expires_before_l2() {
        let l1 = Arc::new(MemoryStore::new(10));
        let l2 = Arc::new(MemoryStore::new(10));
        let store = TieredStore::new(l1.clone(), Some(l2), Duration::from_millis(50));

        store.set(b"tile", b"png", Duration::from_secs(3600)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(l1.get(b"tile").await.unwrap().is_none());
        assert_eq!(store.get(b"tile").await.unwrap(), Some(Bytes::from_static(b"png")));
    }

    #[tokio::test]
    async fn test_custom_values_outlive_l1_ttl_without_l2() {
        let store = Arc::new(TieredStore::new(
            Arc::new(MemoryStore::new(10)),
            None,
            Duration::from_millis(50),
        ));
        let styles = CustomStyleStore::new(store, Duration::from_secs(86400));

        styles.save("client-1", "roads", &"#00ff00").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let loaded: Option<String> = styles.load("client-1", "roads").await.unwrap();
        assert_eq!(loaded.as_deref(), Some("#00ff00"));
    }

    #[tokio::test]
    async fn test_memory_only() {
        let store = TieredStore::memory_only(Arc::new(MemoryStore::new(10)));
        assert!(!store.has_l2());
        assert!(store.get(b"tile").await.unwrap().is_none());
    }
}
