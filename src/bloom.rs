// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Approximate membership filter for first-pass duplicate gating.
//!
//! Classic bloom filter over a word-packed bit array. A negative probe is
//! conclusive (no false negatives); a positive probe must be confirmed
//! against the backend store by the engine.
//!
//! # Sizing
//!
//! Given `n` expected insertions and target false positive rate `p`:
//!
//! - bit array size `m = ceil(-n * ln(p) / ln(2)^2)`
//! - hash count `k = round((m / n) * ln(2))`, at least 1
//!
//! At the defaults (n = 1,000,000, p = 0.01) this yields m = 9,585,059 bits
//! (~1.2 MB) and k = 7. The false positive rate holds while the filter
//! carries up to ~n items and degrades beyond that; the engine's backend
//! confirmation keeps results exact either way.
//!
//! # Hashing
//!
//! One xxh3 128-bit digest per item, split into two 64-bit halves combined
//! by double hashing (`h1 + i * h2 mod m`) to derive the k bit indexes.
//! Cheaper than k independent digests and preserves the false positive
//! bound.
//!
//! # Concurrency
//!
//! Mutation takes `&mut self`; the engine wraps the filter in a mutex and
//! keeps probe/add pairs atomic under it. There is no per-bit deletion:
//! the engine replaces the whole filter on reset.

use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

const WORD_BITS: u64 = 64;

/// Fixed-size bloom filter keyed by string items.
pub struct BloomFilter {
    bits: Vec<u64>,
    bit_count: u64,
    hash_count: u32,
    expected_insertions: u64,
    false_positive_rate: f64,
}

/// Optimal bit array size for `n` insertions at false positive rate `p`.
#[must_use]
pub fn optimal_bit_count(expected_insertions: u64, false_positive_rate: f64) -> u64 {
    let ln2 = std::f64::consts::LN_2;
    let m = -(expected_insertions as f64) * false_positive_rate.ln() / (ln2 * ln2);
    (m.ceil() as u64).max(1)
}

/// Optimal hash function count for `m` bits over `n` insertions.
#[must_use]
pub fn optimal_hash_count(bit_count: u64, expected_insertions: u64) -> u32 {
    let k = (bit_count as f64 / expected_insertions as f64) * std::f64::consts::LN_2;
    (k.round() as u32).max(1)
}

impl BloomFilter {
    /// Create a zeroed filter sized for `expected_insertions` at
    /// `false_positive_rate`.
    ///
    /// Parameters must already be validated (positive insertions, rate in
    /// the open interval (0, 1)); see [`crate::DedupConfig::validate`].
    #[must_use]
    pub fn new(expected_insertions: u64, false_positive_rate: f64) -> Self {
        assert!(expected_insertions > 0, "expected_insertions must be positive");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be within (0, 1)"
        );

        let bit_count = optimal_bit_count(expected_insertions, false_positive_rate);
        let hash_count = optimal_hash_count(bit_count, expected_insertions);
        let words = bit_count.div_ceil(WORD_BITS) as usize;

        debug!(
            expected_insertions,
            false_positive_rate,
            bits = bit_count,
            hashes = hash_count,
            "Sized bloom filter"
        );

        Self {
            bits: vec![0u64; words],
            bit_count,
            hash_count,
            expected_insertions,
            false_positive_rate,
        }
    }

    /// Probe the filter. `false` is conclusive; `true` means "possibly
    /// present" and needs backend confirmation.
    #[must_use]
    pub fn might_contain(&self, item: &str) -> bool {
        let (h1, h2) = Self::hash_pair(item);
        let mut combined = h1;
        for _ in 0..self.hash_count {
            if !self.bit(combined % self.bit_count) {
                return false;
            }
            combined = combined.wrapping_add(h2);
        }
        true
    }

    /// Set the k bit positions for `item`. Idempotent; bits only ever go
    /// 0 to 1.
    pub fn add(&mut self, item: &str) {
        let (h1, h2) = Self::hash_pair(item);
        let mut combined = h1;
        for _ in 0..self.hash_count {
            self.set_bit(combined % self.bit_count);
            combined = combined.wrapping_add(h2);
        }
    }

    /// Estimate the number of distinct items inserted, from the current bit
    /// population: `-(m / k) * ln(1 - X / m)` with `X` set bits.
    ///
    /// Diverges from the true count as the filter saturates past its sized
    /// capacity; that is expected and not an error.
    #[must_use]
    pub fn approximate_element_count(&self) -> u64 {
        let set_bits = self.count_set_bits();
        if set_bits == 0 {
            return 0;
        }
        let m = self.bit_count as f64;
        let fraction = 1.0 - set_bits as f64 / m;
        // fraction == 0 (fully saturated) gives ln(0) = -inf; the cast
        // saturates rather than wrapping.
        (-(m / self.hash_count as f64) * fraction.ln()).round() as u64
    }

    /// Size of the bit array in bits (`m`).
    #[must_use]
    pub fn bit_size(&self) -> u64 {
        self.bit_count
    }

    /// Number of hash functions (`k`).
    #[must_use]
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Number of bits currently set.
    #[must_use]
    pub fn count_set_bits(&self) -> u64 {
        self.bits.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// The insertion count this filter was sized for.
    #[must_use]
    pub fn expected_insertions(&self) -> u64 {
        self.expected_insertions
    }

    /// The false positive rate this filter was sized for.
    #[must_use]
    pub fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }

    fn hash_pair(item: &str) -> (u64, u64) {
        let digest = xxh3_128(item.as_bytes());
        (digest as u64, (digest >> 64) as u64)
    }

    #[inline]
    fn bit(&self, index: u64) -> bool {
        let word = (index / WORD_BITS) as usize;
        let mask = 1u64 << (index % WORD_BITS);
        self.bits[word] & mask != 0
    }

    #[inline]
    fn set_bit(&mut self, index: u64) {
        let word = (index / WORD_BITS) as usize;
        let mask = 1u64 << (index % WORD_BITS);
        self.bits[word] |= mask;
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bits", &self.bit_count)
            .field("hashes", &self.hash_count)
            .field("set_bits", &self.count_set_bits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_law_at_defaults() {
        let filter = BloomFilter::new(1_000_000, 0.01);
        assert_eq!(filter.bit_size(), 9_585_059);
        assert_eq!(filter.hash_count(), 7);
    }

    #[test]
    fn test_sizing_law_tighter_rate() {
        // p = 0.001 needs ~14.4 bits per element and 10 hashes
        let filter = BloomFilter::new(1_000_000, 0.001);
        assert_eq!(filter.bit_size(), 14_377_588);
        assert_eq!(filter.hash_count(), 10);
    }

    #[test]
    fn test_degenerate_sizing_single_bit() {
        // n = 1 at a loose rate collapses to a single bit and hash; every
        // pair of items collides. Used to force false positives in tests.
        let filter = BloomFilter::new(1, 0.99);
        assert_eq!(filter.bit_size(), 1);
        assert_eq!(filter.hash_count(), 1);
    }

    #[test]
    fn test_hash_count_never_zero() {
        // m/n < 1 would round k to zero without the clamp
        let filter = BloomFilter::new(1_000_000, 0.9);
        assert!(filter.hash_count() >= 1);
    }

    #[test]
    fn test_new_filter_is_empty() {
        let filter = BloomFilter::new(1000, 0.01);
        assert_eq!(filter.count_set_bits(), 0);
        assert_eq!(filter.approximate_element_count(), 0);
        assert!(!filter.might_contain("anything"));
    }

    #[test]
    fn test_no_false_negatives() {
        let mut filter = BloomFilter::new(10_000, 0.01);
        for i in 0..1000 {
            filter.add(&format!("item-{}", i));
        }
        for i in 0..1000 {
            assert!(
                filter.might_contain(&format!("item-{}", i)),
                "item-{} must never be reported absent",
                i
            );
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut filter = BloomFilter::new(1000, 0.01);
        filter.add("same");
        let bits_after_first = filter.count_set_bits();
        filter.add("same");
        filter.add("same");
        assert_eq!(filter.count_set_bits(), bits_after_first);
    }

    #[test]
    fn test_false_positive_rate_near_target() {
        let mut filter = BloomFilter::new(10_000, 0.01);
        for i in 0..10_000 {
            filter.add(&format!("present-{}", i));
        }

        let mut false_positives = 0;
        for i in 0..10_000 {
            if filter.might_contain(&format!("absent-{}", i)) {
                false_positives += 1;
            }
        }

        // Target is 1%; allow slack for hash variance
        let rate = false_positives as f64 / 10_000.0;
        assert!(rate < 0.03, "false positive rate {} is too high", rate);
    }

    #[test]
    fn test_approximate_count_tracks_insertions() {
        let mut filter = BloomFilter::new(100_000, 0.01);
        for i in 0..5_000 {
            filter.add(&format!("item-{}", i));
        }

        let estimate = filter.approximate_element_count();
        // Bit-population estimator is accurate to a few percent at this load
        assert!(
            (4_500..=5_500).contains(&estimate),
            "estimate {} too far from 5000",
            estimate
        );
    }

    #[test]
    fn test_approximate_count_saturated_filter() {
        let mut filter = BloomFilter::new(1, 0.99);
        filter.add("only");
        // All bits set: the estimator has no information left, but it must
        // not panic or report zero
        assert!(filter.approximate_element_count() >= 1);
    }

    #[test]
    fn test_distinct_items_set_distinct_bits() {
        let mut filter = BloomFilter::new(10_000, 0.01);
        filter.add("a");
        let after_one = filter.count_set_bits();
        filter.add("b");
        assert!(filter.count_set_bits() > after_one);
    }

    #[test]
    #[should_panic(expected = "expected_insertions")]
    fn test_zero_insertions_panics() {
        let _ = BloomFilter::new(0, 0.01);
    }

    #[test]
    #[should_panic(expected = "false_positive_rate")]
    fn test_invalid_rate_panics() {
        let _ = BloomFilter::new(1000, 1.5);
    }
}
