//! The cache capability: byte keys, byte values, expiry.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Cache get failed: {0}")]
    Get(String),

    #[error("Cache set failed: {0}")]
    Set(String),

    #[error("Cache value could not be decoded: {0}")]
    Decode(String),
}

impl From<CacheError> for wfs_common::MapError {
    fn from(err: CacheError) -> Self {
        wfs_common::MapError::CacheUnavailable(err.to_string())
    }
}

/// Key/value byte store with per-entry expiry.
///
/// Implementations are shared between concurrent requests without any
/// client-side locking; concurrent writers to one key resolve as last write
/// wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value, `None` when absent or expired.
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<(), CacheError>;
}
