//! Persistent key-value store used for snapshots and watch settings.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use watch_db::Database;

/// Keys the core reads and writes.
pub mod keys {
    pub const STREAMS: &str = "streams";
    pub const SCHEDULES: &str = "schedules";
    pub const PREVIOUS_STREAMS: &str = "previousStreams";
    pub const SETTINGS: &str = "settings";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] watch_db::DbError),

    #[error("Invalid value for {key}: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Async key-value storage, durable across restarts.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Load and deserialize the value stored under `key`.
pub async fn load<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`.
pub async fn save<T: Serialize + ?Sized>(
    store: &dyn Store,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value).await
}

#[async_trait]
impl Store for Database {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Serde {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.kv_set(key, &value.to_string())?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.kv_remove(keys)?;
        Ok(())
    }
}

/// Volatile store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::{PlatformType, Stream};

    #[tokio::test]
    async fn memory_store_round_trips_typed_values() {
        let store = MemoryStore::new();
        let streams = vec![Stream::new(PlatformType::Twitch, "1", "alice", "hi")];
        save(&store, keys::STREAMS, &streams).await.unwrap();

        let loaded: Option<Vec<Stream>> = load(&store, keys::STREAMS).await.unwrap();
        assert_eq!(loaded, Some(streams));

        store.remove(&[keys::STREAMS]).await.unwrap();
        let loaded: Option<Vec<Stream>> = load(&store, keys::STREAMS).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn database_store_persists_json() {
        let db = Database::open_in_memory().unwrap();
        db.set(keys::SETTINGS, serde_json::json!({"updateInterval": 120}))
            .await
            .unwrap();
        let value = Store::get(&db, keys::SETTINGS).await.unwrap().unwrap();
        assert_eq!(value["updateInterval"], 120);

        db.remove(&[keys::SETTINGS]).await.unwrap();
        assert!(Store::get(&db, keys::SETTINGS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_reports_type_mismatch() {
        let store = MemoryStore::new();
        store
            .set(keys::STREAMS, serde_json::json!({"not": "a list"}))
            .await
            .unwrap();
        let result: Result<Option<Vec<Stream>>, _> = load(&store, keys::STREAMS).await;
        assert!(matches!(result, Err(StoreError::Serde { .. })));
    }
}
