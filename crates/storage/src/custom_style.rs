//! Storage of per-client custom style values.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::{CacheError, CacheStore};
use crate::tile_cache::escape_field;

const KEY_PREFIX: &str = "WFSCustomStyle";

/// Persists client-registered style values as JSON in the cache store.
#[derive(Clone)]
pub struct CustomStyleStore {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CustomStyleStore {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Store key for a client's values on one layer.
    pub fn key(client_id: &str, layer_id: &str) -> String {
        format!(
            "{}_{}_{}",
            KEY_PREFIX,
            escape_field(client_id),
            escape_field(layer_id)
        )
    }

    pub async fn save<T: Serialize>(
        &self,
        client_id: &str,
        layer_id: &str,
        values: &T,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_vec(values).map_err(|e| CacheError::Set(e.to_string()))?;
        self.store
            .set(Self::key(client_id, layer_id).as_bytes(), &json, self.ttl)
            .await
    }

    /// Load a client's values, `None` when nothing usable is stored.
    pub async fn load<T: DeserializeOwned>(
        &self,
        client_id: &str,
        layer_id: &str,
    ) -> Result<Option<T>, CacheError> {
        let key = Self::key(client_id, layer_id);
        let Some(data) = self.store.get(key.as_bytes()).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&data) {
            Ok(values) => Ok(Some(values)),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored custom style is not readable");
                Err(CacheError::Decode(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Values {
        fill: String,
        width: f64,
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = CustomStyleStore::new(
            Arc::new(MemoryStore::new(10)),
            Duration::from_secs(3600),
        );
        let values = Values {
            fill: "#ff0000".to_string(),
            width: 2.0,
        };

        store.save("client-1", "42", &values).await.unwrap();

        let loaded: Option<Values> = store.load("client-1", "42").await.unwrap();
        assert_eq!(loaded, Some(values));

        let missing: Option<Values> = store.load("client-2", "42").await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_key_format() {
        assert_eq!(CustomStyleStore::key("c1", "42"), "WFSCustomStyle_c1_42");
        assert_eq!(
            CustomStyleStore::key("c1", "userlayer_5"),
            "WFSCustomStyle_c1_userlayer%5F5"
        );
    }

    #[tokio::test]
    async fn test_delimiter_in_ids_does_not_share_keys() {
        assert_ne!(
            CustomStyleStore::key("alice", "userlayer_5"),
            CustomStyleStore::key("alice_userlayer", "5")
        );

        let store = CustomStyleStore::new(Arc::new(MemoryStore::new(10)), Duration::from_secs(3600));
        store.save("alice", "userlayer_5", &"alice-values").await.unwrap();
        store.save("alice_userlayer", "5", &"bob-values").await.unwrap();

        let alice: Option<String> = store.load("alice", "userlayer_5").await.unwrap();
        assert_eq!(alice.as_deref(), Some("alice-values"));
    }
}
