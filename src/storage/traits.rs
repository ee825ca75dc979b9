use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Authoritative set of accepted items.
///
/// The store is the exact side of the duplicate check: the bloom filter's
/// positive probes are confirmed here. Implementations must provide their
/// own internal concurrency safety and keep `store` idempotent: a second
/// insert of the same item must not change `count()`.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Exact membership test.
    async fn contains(&self, item: &str) -> Result<bool, StorageError>;

    /// Idempotent insert.
    async fn store(&self, item: &str) -> Result<(), StorageError>;

    /// Exact cardinality.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Remove every stored item.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Implementation identity, surfaced in engine stats.
    fn name(&self) -> &str;
}
