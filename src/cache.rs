// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Confirmation cache over backend membership lookups.
//!
//! When the bloom filter reports "possibly present", the engine has to ask
//! the backend store whether the item really exists. This cache memoizes
//! the last known backend answer per item so repeated confirmation traffic
//! for the same hot keys doesn't hit the backend every time.
//!
//! Not authoritative: an entry may be absent for any key at any time, and
//! absence forces a backend lookup. Every code path that changes backend
//! membership for a key must invalidate that key here in the same logical
//! operation, or a stale "not present" answer could be served after the
//! item is stored.
//!
//! Bounded by max entries with oldest-insertion eviction.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::storage::traits::StorageError;

/// Memoized backend-confirmation results, keyed by item.
pub struct ConfirmationCache {
    /// item → last known backend answer
    entries: DashMap<String, bool>,
    /// Insertion order for eviction (oldest first)
    order: Mutex<VecDeque<String>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entry_count: usize,
    /// Hit rate over all lookups (0.0 - 1.0)
    pub hit_rate: f64,
}

impl ConfirmationCache {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Return the cached answer for `item`, or run `loader` (a backend
    /// `contains` call), cache its result and return it.
    ///
    /// Loader errors propagate and nothing is cached for the key.
    pub async fn get<F, Fut>(&self, item: &str, loader: F) -> Result<bool, StorageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, StorageError>>,
    {
        if let Some(cached) = self.entries.get(item) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_cache_lookup("hit");
            return Ok(*cached);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_lookup("miss");

        let value = loader().await?;
        self.insert(item, value);
        Ok(value)
    }

    /// Drop the entry for `item`, if any. Must be called whenever the
    /// backend membership for `item` changes.
    pub fn invalidate(&self, item: &str) {
        if self.entries.remove(item).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let dropped = self.entries.len() as u64;
        self.entries.clear();
        self.order.lock().clear();
        self.invalidations.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot hit/miss/invalidation counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entry_count: self.entries.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn insert(&self, item: &str, value: bool) {
        // Evict oldest entries if at capacity. Keys already invalidated may
        // still sit in the order queue; removing them again is a no-op.
        if self.entries.len() >= self.max_entries {
            let mut order = self.order.lock();
            while self.entries.len() >= self.max_entries {
                match order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        let is_new = !self.entries.contains_key(item);
        self.entries.insert(item.to_string(), value);

        if is_new {
            self.order.lock().push_back(item.to_string());
        }
    }
}
