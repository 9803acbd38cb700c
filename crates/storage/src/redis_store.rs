//! Redis-backed cache store.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tracing::info;

use crate::cache::{CacheError, CacheStore};

/// Redis cache client.
///
/// The multiplexed connection is cheap to clone; each call works on its own
/// handle so the store can be shared behind an `Arc` without locking.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(format!("Redis connection failed: {}", e)))?;

        info!(url = %redis_url, "Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.conn.clone();

        let result: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::Get(e.to_string()))?;

        Ok(result.map(Bytes::from))
    }

    async fn set(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SET EX rejects a zero expiry
        let secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(key, value, secs)
            .await
            .map_err(|e| CacheError::Set(e.to_string()))?;

        Ok(())
    }
}
