//! Registry counters.

use serde::Serialize;

/// Running totals kept by the registry.
///
/// # Example Output
///
/// ```json
/// {
///   "accepted": 12,
///   "duplicates": 1,
///   "rejected": 0,
///   "delivered": 4,
///   "decode_failures": 0,
///   "undelivered": 0,
///   "evicted": 1
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Chunks stored in a group.
    pub accepted: u64,
    /// Chunks ignored because their sequence was already stored.
    pub duplicates: u64,
    /// Chunks refused (inconsistent total or limits).
    pub rejected: u64,
    /// Documents handed to the consumer.
    pub delivered: u64,
    /// Complete groups whose merged bytes failed to decode.
    pub decode_failures: u64,
    /// Complete groups dropped because no consumer was set.
    pub undelivered: u64,
    /// Incomplete groups dropped by eviction.
    pub evicted: u64,
}

impl RegistryStats {
    /// Serialize to compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("BUG: stats of plain integers failed to serialize")
    }
}
