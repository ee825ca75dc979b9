//! Public result types for the dedup engine.

use serde::Serialize;

/// Outcome of a single duplicate check. Produced once per check, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCheckResult {
    /// Whether the item was already stored
    pub is_duplicate: bool,
    /// Whether the filter claimed presence for an item the backend denied
    pub was_false_positive: bool,
    /// Human-readable branch description
    pub message: String,
}

impl DuplicateCheckResult {
    pub(super) fn new_item() -> Self {
        Self {
            is_duplicate: false,
            was_false_positive: false,
            message: "New item".to_string(),
        }
    }

    pub(super) fn confirmed_duplicate() -> Self {
        Self {
            is_duplicate: true,
            was_false_positive: false,
            message: "Confirmed duplicate".to_string(),
        }
    }

    pub(super) fn false_positive_resolved() -> Self {
        Self {
            is_duplicate: false,
            was_false_positive: true,
            message: "New item (false positive resolved)".to_string(),
        }
    }
}

impl std::fmt::Display for DuplicateCheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Point-in-time snapshot of engine state, valid only at the instant of
/// capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    /// Insertion count the filter was sized for
    pub expected_insertions: u64,
    /// False positive rate the filter was sized for
    pub false_positive_rate: f64,
    /// Exact item count from the backend store
    pub backend_count: u64,
    /// The filter's self-estimated cardinality; diverges from
    /// `backend_count` once the filter saturates
    pub approximate_element_count: u64,
    /// Identity of the active backend store
    pub backend_store_name: String,
}
