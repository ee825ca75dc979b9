//! # Dedup Engine
//!
//! A high-throughput duplicate detection engine for streams of opaque string
//! identifiers, built as a two-tier membership check.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     check_and_store(item)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Tier 1: Bloom Filter (memory)               │
//! │  • Fixed-size bit array, sized from (n, p)                  │
//! │  • "definitely new" is conclusive (no false negatives)      │
//! │  • "maybe seen" needs backend confirmation                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (positive probe)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Confirmation Cache (memoization)               │
//! │  • Last known backend answer per item                       │
//! │  • Invalidated whenever backend membership changes          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (cache miss)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Tier 2: Backend Store (authoritative)            │
//! │  • Exact membership, idempotent insert, exact count         │
//! │  • In-memory (DashMap) or SQL (unique-key table)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dedup_engine::{DedupConfig, DedupEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DedupConfig::default();
//!     let engine = DedupEngine::connect(config).await.expect("engine init");
//!
//!     let result = engine.check_and_store("order-42").await.expect("check");
//!     assert!(!result.is_duplicate);
//!
//!     let result = engine.check_and_store("order-42").await.expect("check");
//!     assert!(result.is_duplicate);
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **No false negatives**: an item accepted once is always flagged on
//!   re-check (filter positives are confirmed against the backend).
//! - **Idempotent storage**: checking the same item twice grows the backend
//!   count by exactly one.
//! - **Transparent false positives**: a filter collision is resolved against
//!   the backend and reported in the result, never mistaken for a duplicate.
//!
//! ## Modules
//!
//! - [`engine`]: The [`DedupEngine`] orchestrating filter, cache and store
//! - [`bloom`]: The approximate membership filter and its sizing math
//! - [`storage`]: Backend store trait and implementations (memory, SQL)
//! - [`cache`]: Confirmation cache over backend lookups
//! - [`resilience`]: Retry policies for the SQL backend
//! - [`config`]: Engine configuration and validation

pub mod bloom;
pub mod cache;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod resilience;
pub mod storage;

pub use bloom::BloomFilter;
pub use cache::{CacheStats, ConfirmationCache};
pub use config::{ConfigError, DedupConfig};
pub use engine::{DedupEngine, DedupError, DuplicateCheckResult, EngineStats};
pub use resilience::retry::RetryConfig;
pub use storage::memory::InMemoryStore;
pub use storage::sql::SqlStore;
pub use storage::traits::{BackendStore, StorageError};
