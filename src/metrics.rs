// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the dedup engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! process chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `dedup_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: new, duplicate, false_positive, error
//! - `result`: hit, miss (cache lookups)

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Record the outcome of a duplicate check
pub fn record_check(outcome: &str) {
    counter!(
        "dedup_engine_checks_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record duplicate check latency
pub fn record_check_latency(duration: Duration) {
    histogram!("dedup_engine_check_seconds").record(duration.as_secs_f64());
}

/// Record a resolved filter false positive
pub fn record_false_positive() {
    counter!("dedup_engine_false_positives_total").increment(1);
}

/// Record a confirmation cache lookup
pub fn record_cache_lookup(result: &str) {
    counter!(
        "dedup_engine_cache_lookups_total",
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record an engine reset
pub fn record_clear() {
    counter!("dedup_engine_clears_total").increment(1);
}

/// Set the backend store's exact item count
pub fn set_backend_items(count: u64) {
    gauge!("dedup_engine_backend_items").set(count as f64);
}

/// Set the filter's current bit population
pub fn set_filter_bits_set(count: u64) {
    gauge!("dedup_engine_filter_bits_set").set(count as f64);
}
