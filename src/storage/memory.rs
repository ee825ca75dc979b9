use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{BackendStore, StorageError};

/// Process-local backend store over a concurrent set.
///
/// Suitable for development, tests and single-process deployments; contents
/// do not survive a restart. The counter is incremented only on first
/// insert of a key, keeping `count()` exact under concurrent stores.
pub struct InMemoryStore {
    items: DashMap<String, ()>,
    counter: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendStore for InMemoryStore {
    async fn contains(&self, item: &str) -> Result<bool, StorageError> {
        Ok(self.items.contains_key(item))
    }

    async fn store(&self, item: &str) -> Result<(), StorageError> {
        // Entry-based insert so the counter only moves on first insert
        if let dashmap::mapref::entry::Entry::Vacant(slot) = self.items.entry(item.to_string()) {
            slot.insert(());
            self.counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.counter.load(Ordering::Relaxed))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.items.clear();
        self.counter.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.contains("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_and_contains() {
        let store = InMemoryStore::new();

        store.store("item-1").await.unwrap();

        assert!(store.contains("item-1").await.unwrap());
        assert!(!store.contains("item-2").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let store = InMemoryStore::new();

        store.store("same").await.unwrap();
        store.store("same").await.unwrap();
        store.store("same").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStore::new();

        for i in 0..10 {
            store.store(&format!("item-{}", i)).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 10);

        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.contains("item-0").await.unwrap());
    }

    #[tokio::test]
    async fn test_name() {
        let store = InMemoryStore::new();
        assert_eq!(store.name(), "in-memory");
    }

    #[tokio::test]
    async fn test_concurrent_store_counts_each_key_once() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];

        // 10 tasks all racing to store the same 10 keys
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store.store(&format!("key-{}", i)).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 10);
    }
}
