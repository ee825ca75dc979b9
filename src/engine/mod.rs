// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Duplicate detection orchestrator.
//!
//! The [`DedupEngine`] ties the three tiers together:
//! - the bloom filter as first-pass gate
//! - the confirmation cache absorbing repeated backend lookups
//! - the backend store as exact authority
//!
//! # Confirmation protocol
//!
//! ```text
//! check_and_store(item)
//!       │
//!       ▼  (filter lock: probe, add if absent)
//! might_contain? ──no──→ store in backend → invalidate cache → New item
//!       │yes
//!       ▼
//! cache/backend contains? ──yes──→ Confirmed duplicate
//!       │no  (filter false positive)
//!       ▼
//! re-add to filter → store in backend → invalidate cache
//!       → New item (false positive resolved)
//! ```
//!
//! # Consistency
//!
//! The filter mutex keeps probe/add pairs atomic, so at most one caller
//! takes the "new" branch for the first occurrence of an item; a racing
//! second caller finds the bits already set and lands in the confirmation
//! branch, where the backend gives the exact answer. The backend write and
//! cache invalidation happen outside the filter lock; `BackendStore::store`
//! idempotence and invalidate-after-write ordering close the remaining
//! window.

mod types;

pub use types::{DuplicateCheckResult, EngineStats};

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bloom::BloomFilter;
use crate::cache::{CacheStats, ConfirmationCache};
use crate::config::{ConfigError, DedupConfig};
use crate::storage;
use crate::storage::traits::{BackendStore, StorageError};

/// Engine-level error surface.
///
/// Collaborator failures are a distinct outcome, never folded into a
/// success-shaped "new item" result: treating an unreachable backend as
/// "not a duplicate" would silently re-admit duplicate data.
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("backend store failure during {op}: {source}")]
    Store {
        op: &'static str,
        source: StorageError,
    },
}

/// Duplicate detection engine.
///
/// Owns one live filter instance (replaced wholesale on [`clear`](Self::clear)),
/// the confirmation cache, and a handle to the pluggable backend store.
/// Multiple independent engines may coexist; there is no process-global
/// state.
///
/// # Thread Safety
///
/// `Send + Sync`, designed for concurrent checks. Items must be non-empty;
/// enforcing that is the caller surface's concern.
pub struct DedupEngine {
    config: DedupConfig,
    /// Single live filter; the mutex scopes probe/add pairs and is never
    /// held across await points
    filter: Mutex<BloomFilter>,
    store: Arc<dyn BackendStore>,
    cache: ConfirmationCache,
}

impl DedupEngine {
    /// Create an engine over an injected backend store.
    ///
    /// Validates the configuration and sizes the filter from it.
    pub fn new(config: DedupConfig, store: Arc<dyn BackendStore>) -> Result<Self, DedupError> {
        config.validate()?;

        let filter = BloomFilter::new(config.expected_insertions, config.false_positive_rate);
        let cache = ConfirmationCache::new(config.cache_max_entries);

        info!(
            expected_insertions = config.expected_insertions,
            false_positive_rate = config.false_positive_rate,
            filter_bits = filter.bit_size(),
            filter_hashes = filter.hash_count(),
            backend = store.name(),
            "Dedup engine created"
        );

        Ok(Self {
            config,
            filter: Mutex::new(filter),
            store,
            cache,
        })
    }

    /// Create an engine with the backend store selected by configuration
    /// (SQL when `sql_url` is set, in-memory otherwise).
    pub async fn connect(config: DedupConfig) -> Result<Self, DedupError> {
        config.validate()?;
        let store = storage::connect(&config)
            .await
            .map_err(|source| DedupError::Store {
                op: "connect",
                source,
            })?;
        Self::new(config, store)
    }

    /// Check whether `item` was seen before and record it if not.
    ///
    /// Exactly one of three outcomes: new item, confirmed duplicate, or
    /// new item via resolved false positive. Backend failures surface as
    /// [`DedupError::Store`].
    #[tracing::instrument(skip(self), fields(outcome))]
    pub async fn check_and_store(&self, item: &str) -> Result<DuplicateCheckResult, DedupError> {
        let start = Instant::now();

        // Probe and (on a miss) claim the bits in one critical section, so
        // concurrent first checks of the same item serialize here and only
        // one of them takes the "new" branch.
        let first_sighting = {
            let mut filter = self.filter.lock();
            if filter.might_contain(item) {
                false
            } else {
                filter.add(item);
                true
            }
        };

        let result = if first_sighting {
            debug!("Filter negative, item is new");
            self.admit(item, false).await
        } else {
            self.confirm(item).await
        };

        match &result {
            Ok(check) => {
                let outcome = if check.was_false_positive {
                    "false_positive"
                } else if check.is_duplicate {
                    "duplicate"
                } else {
                    "new"
                };
                tracing::Span::current().record("outcome", outcome);
                crate::metrics::record_check(outcome);
            }
            Err(e) => {
                tracing::Span::current().record("outcome", "error");
                crate::metrics::record_check("error");
                warn!(error = %e, "Duplicate check failed");
            }
        }
        crate::metrics::record_check_latency(start.elapsed());

        result
    }

    /// Resolve a filter positive against the cache and backend.
    async fn confirm(&self, item: &str) -> Result<DuplicateCheckResult, DedupError> {
        let confirmed = self
            .cache
            .get(item, || self.store.contains(item))
            .await
            .map_err(|source| DedupError::Store {
                op: "contains",
                source,
            })?;

        if confirmed {
            debug!("Backend confirmed duplicate");
            return Ok(DuplicateCheckResult::confirmed_duplicate());
        }

        // The filter's positive was a collision. Re-affirm the bits (a
        // no-op unless the filter was reset in between) and admit the item.
        debug!("Filter false positive, admitting item");
        crate::metrics::record_false_positive();
        self.filter.lock().add(item);
        self.admit(item, true).await
    }

    /// Persist a new item and invalidate its cache entry, in that order:
    /// the entry must not be refreshed before the backend write commits.
    async fn admit(
        &self,
        item: &str,
        was_false_positive: bool,
    ) -> Result<DuplicateCheckResult, DedupError> {
        self.store
            .store(item)
            .await
            .map_err(|source| DedupError::Store {
                op: "store",
                source,
            })?;
        self.cache.invalidate(item);

        Ok(if was_false_positive {
            DuplicateCheckResult::false_positive_resolved()
        } else {
            DuplicateCheckResult::new_item()
        })
    }

    /// Snapshot engine configuration, backend count and filter estimate.
    pub async fn stats(&self) -> Result<EngineStats, DedupError> {
        let backend_count = self
            .store
            .count()
            .await
            .map_err(|source| DedupError::Store {
                op: "count",
                source,
            })?;

        let (approximate_element_count, bits_set) = {
            let filter = self.filter.lock();
            (filter.approximate_element_count(), filter.count_set_bits())
        };

        crate::metrics::set_backend_items(backend_count);
        crate::metrics::set_filter_bits_set(bits_set);

        Ok(EngineStats {
            expected_insertions: self.config.expected_insertions,
            false_positive_rate: self.config.false_positive_rate,
            backend_count,
            approximate_element_count,
            backend_store_name: self.store.name().to_string(),
        })
    }

    /// Reset all three tiers: replace the filter wholesale, clear the
    /// backend store, drop every cache entry, in that order.
    ///
    /// A partial reset is reported, not swallowed: an empty filter over a
    /// populated backend would re-admit every stored item as "new" on its
    /// next check.
    pub async fn clear(&self) -> Result<(), DedupError> {
        {
            let mut filter = self.filter.lock();
            *filter = BloomFilter::new(
                self.config.expected_insertions,
                self.config.false_positive_rate,
            );
        }

        self.store
            .clear()
            .await
            .map_err(|source| DedupError::Store {
                op: "clear",
                source,
            })?;

        self.cache.invalidate_all();

        crate::metrics::record_clear();
        info!("Dedup engine cleared");
        Ok(())
    }

    /// Probe the filter without mutating it. Observability hook; the
    /// result carries the filter's usual false positive caveat.
    #[must_use]
    pub fn filter_might_contain(&self, item: &str) -> bool {
        self.filter.lock().might_contain(item)
    }

    /// Confirmation cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The active backend store's identity.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.store.name()
    }
}
