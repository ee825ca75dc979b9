//! Backend store implementations.
//!
//! The [`traits::BackendStore`] capability set is the seam for plugging in
//! new storage backends without touching the engine. Two implementations
//! ship with the crate:
//!
//! - [`memory::InMemoryStore`]: process-local concurrent set, non-durable
//! - [`sql::SqlStore`]: unique-key table via sqlx (SQLite/MySQL/Postgres),
//!   durable across restarts

pub mod memory;
pub mod sql;
pub mod traits;

use std::sync::Arc;

use tracing::info;

use crate::config::DedupConfig;
use memory::InMemoryStore;
use sql::SqlStore;
use traits::{BackendStore, StorageError};

/// Build the backend store selected by configuration: SQL when `sql_url`
/// is set, in-memory otherwise.
pub async fn connect(config: &DedupConfig) -> Result<Arc<dyn BackendStore>, StorageError> {
    match config.sql_url {
        Some(ref url) => {
            let store = SqlStore::new(url).await?;
            info!(backend = store.name(), "Connected backend store");
            Ok(Arc::new(store))
        }
        None => {
            info!(backend = "in-memory", "Using in-memory backend store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
