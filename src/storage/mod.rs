//! Asynchronous key-value storage the counter cell persists into.
//!
//! Values are stored as JSON so any serde type can live behind a key.
//! Backends make no transactional promises: a `set` racing a `get` may
//! or may not be observed by it.

mod file;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StorageError;

pub use file::JsonFileStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the record stored under `key`, `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the record stored under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Process-local storage. Records vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records<I, K>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            records: RwLock::new(records.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Synchronous peek used by tests and diagnostics.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.records.read().get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.records.write().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_storage_get_set() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("count").await.unwrap(), None);

        storage.set("count", json!(3)).await.unwrap();
        assert_eq!(storage.get("count").await.unwrap(), Some(json!(3)));
        assert_eq!(storage.peek("count"), Some(json!(3)));
    }

    #[tokio::test]
    async fn memory_storage_seeded() {
        let storage = MemoryStorage::with_records([("count", json!(-2))]);
        assert_eq!(storage.get("count").await.unwrap(), Some(json!(-2)));
        assert_eq!(storage.get("other").await.unwrap(), None);
    }
}
