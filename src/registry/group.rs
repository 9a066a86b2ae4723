//! State for one message group being reassembled.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Chunks received so far for one group id.
///
/// Only the registry holds these; dropping a group frees every payload at once.
#[derive(Debug)]
pub(crate) struct MessageGroup {
    /// Number of chunks announced by the first chunk.
    total: u32,
    /// Received payloads, keyed by sequence number.
    received: HashMap<u32, Vec<u8>>,
    /// When the last chunk was stored.
    last_activity: Instant,
}

impl MessageGroup {
    pub(crate) fn new(total: u32, now: Instant) -> Self {
        Self {
            total,
            received: HashMap::new(),
            last_activity: now,
        }
    }

    pub(crate) fn total(&self) -> u32 {
        self.total
    }

    pub(crate) fn received_count(&self) -> usize {
        self.received.len()
    }

    /// Store a payload. Returns `false` if the sequence was already present,
    /// in which case nothing changes.
    pub(crate) fn insert(&mut self, sequence: u32, payload: Vec<u8>, now: Instant) -> bool {
        if self.received.contains_key(&sequence) {
            return false;
        }
        self.received.insert(sequence, payload);
        self.last_activity = now;
        true
    }

    /// Check if all announced chunks have arrived.
    pub(crate) fn is_complete(&self) -> bool {
        self.received.len() == self.total as usize
    }

    /// Time since the last stored chunk.
    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        // saturating: callers may pass an `now` older than the last activity
        now.saturating_duration_since(self.last_activity)
    }

    /// Concatenate payloads in ascending sequence order.
    ///
    /// Sequence numbers only need to be unique, not contiguous.
    pub(crate) fn assemble(self) -> Vec<u8> {
        let total_size: usize = self.received.values().map(Vec::len).sum();
        let mut parts: Vec<(u32, Vec<u8>)> = self.received.into_iter().collect();
        parts.sort_by_key(|(sequence, _)| *sequence);

        let mut merged = Vec::with_capacity(total_size);
        for (_, payload) in parts {
            merged.extend_from_slice(&payload);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_complete() {
        let now = Instant::now();
        let mut group = MessageGroup::new(2, now);
        assert!(!group.is_complete());

        assert!(group.insert(2, b"world".to_vec(), now));
        assert!(!group.is_complete());
        assert!(group.insert(1, b"hello ".to_vec(), now));
        assert!(group.is_complete());
        assert_eq!(group.received_count(), 2);

        assert_eq!(group.assemble(), b"hello world".to_vec());
    }

    #[test]
    fn test_duplicate_insert_keeps_first_payload_and_timestamp() {
        let start = Instant::now();
        let later = start + Duration::from_secs(5);
        let mut group = MessageGroup::new(3, start);

        assert!(group.insert(1, b"first".to_vec(), start));
        assert!(!group.insert(1, b"second".to_vec(), later));
        assert_eq!(group.received_count(), 1);
        assert_eq!(group.idle_for(later), Duration::from_secs(5));
    }

    #[test]
    fn test_assemble_sparse_sequences() {
        let now = Instant::now();
        let mut group = MessageGroup::new(3, now);
        group.insert(40, b"c".to_vec(), now);
        group.insert(2, b"a".to_vec(), now);
        group.insert(7, b"b".to_vec(), now);

        assert!(group.is_complete());
        assert_eq!(group.assemble(), b"abc".to_vec());
    }

    #[test]
    fn test_idle_for_saturates() {
        let now = Instant::now();
        let group = MessageGroup::new(1, now + Duration::from_secs(1));
        assert_eq!(group.idle_for(now), Duration::ZERO);
    }
}
