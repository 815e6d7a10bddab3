//! Storage capability consumed by the reference resolver.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::connection::CacheDb;
use super::entries::CacheEntry;
use crate::Error;

/// Keyed subscription storage.
///
/// Replacing a key must be atomic: readers observe the old or the new entry.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fetch the entry registered under `key`.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), Error>;
}

#[async_trait]
impl SubscriptionStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(key).await
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), Error> {
        self.upsert_entry(key, &entry).await
    }
}

/// In-process store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn exercise(store: Arc<dyn SubscriptionStore>) {
        assert!(store.get("k1").await.unwrap().is_none());

        store
            .put("k1", CacheEntry::new("https://a", "proxies: []", "", false))
            .await
            .unwrap();
        let entry = store.get("k1").await.unwrap().unwrap();
        assert_eq!(entry.raw_text.as_deref(), Some("proxies: []"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        exercise(Arc::new(CacheDb::open_in_memory().await.unwrap())).await;
    }
}
