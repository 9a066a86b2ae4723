//! Reassembly of chunked documents.
//!
//! The registry keeps one [`MessageGroup`] per in-flight group id. Each
//! accepted chunk either opens a group, adds to one, or is dropped as a
//! duplicate or inconsistent. When the last chunk of a group arrives the
//! group is merged on the spot: payloads are concatenated in sequence order,
//! decoded, and handed to the consumer. The group is gone after that, whatever
//! the outcome, so every group left in the registry is incomplete.
//!
//! Groups that stop receiving chunks are only removed by [`Registry::evict`];
//! the registry never schedules anything itself.
//!
//! # Example
//!
//! ```
//! use json_segments::segment::{overhead, split};
//! use json_segments::{JsonCodec, Registry};
//! use std::sync::{Arc, Mutex};
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&received);
//!
//! let mut registry = Registry::new(JsonCodec);
//! registry.set_consumer(move |doc: serde_json::Value| sink.lock().unwrap().push(doc));
//!
//! let text = r#"{"temperature":21.5,"unit":"C"}"#;
//! let mut chunks = split(text, "reading-1", overhead("reading-1") + 8).unwrap();
//! chunks.reverse();
//!
//! for chunk in chunks {
//!     registry.accept(chunk).unwrap();
//! }
//!
//! assert_eq!(received.lock().unwrap().len(), 1);
//! assert_eq!(registry.pending_count(), 0);
//! ```

use log::{debug, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::config::{RegistryConfig, RegistryConfigError};
use super::consumer::Consumer;
use super::group::MessageGroup;
use super::stats::RegistryStats;
use crate::codec::{Codec, CodecError, JsonCodec};
use crate::segment::{Chunk, ChunkError};

/// Result of accepting a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Chunk stored; the group is still incomplete.
    Pending {
        /// Chunks received so far.
        received: usize,
        /// Chunks announced for the group.
        total: u32,
    },
    /// Sequence already stored for this group; nothing changed.
    Duplicate,
    /// Chunk completed its group and the document went to the consumer.
    Delivered,
}

/// Tracks partially received groups and merges them once complete.
///
/// # Memory Safety
///
/// Incomplete groups stay until [`Registry::evict`] or [`Registry::delete`]
/// removes them. Two optional limits from [`RegistryConfig`] add hard bounds:
/// - `max_pending`: chunks that would open a group beyond this are refused
/// - `max_total`: chunks opening a group with more chunks than this are refused
pub struct Registry<C: Codec = JsonCodec> {
    /// Groups being reassembled, keyed by group id.
    groups: HashMap<String, MessageGroup>,
    codec: C,
    consumer: Option<Box<dyn Consumer<C::Document>>>,
    config: RegistryConfig,
    stats: RegistryStats,
}

impl<C: Codec> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups.len())
            .field("has_consumer", &self.consumer.is_some())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C: Codec> Registry<C> {
    /// Create a registry with the default configuration and no consumer.
    pub fn new(codec: C) -> Self {
        Self {
            groups: HashMap::new(),
            codec,
            consumer: None,
            config: RegistryConfig::default(),
            stats: RegistryStats::default(),
        }
    }

    /// Create a registry with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(codec: C, config: RegistryConfig) -> Result<Self, RegistryConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(codec)
        })
    }

    /// Register the consumer for reassembled documents, replacing any previous one.
    pub fn set_consumer(&mut self, consumer: impl Consumer<C::Document> + 'static) {
        self.consumer = Some(Box::new(consumer));
    }

    /// Remove the consumer. Groups completing afterwards are dropped with
    /// [`ReassemblyError::NoConsumerConfigured`].
    pub fn clear_consumer(&mut self) {
        self.consumer = None;
    }

    /// Check if a consumer is registered.
    pub fn has_consumer(&self) -> bool {
        self.consumer.is_some()
    }

    /// Accept a chunk.
    ///
    /// If the chunk completes its group, the group is merged before this
    /// returns and merge errors are passed through.
    ///
    /// # Errors
    ///
    /// - [`ReassemblyError::InconsistentTotal`] if the group exists with a
    ///   different total (the group is left untouched)
    /// - [`ReassemblyError::TooManySegments`] / [`ReassemblyError::TooManyPendingGroups`]
    ///   if a configured limit would be exceeded
    /// - any error from [`Registry::merge`]
    pub fn accept(&mut self, chunk: Chunk) -> Result<AcceptOutcome, ReassemblyError> {
        self.accept_at(chunk, Instant::now())
    }

    /// Accept a chunk, recording `now` as its arrival time.
    pub fn accept_at(
        &mut self,
        chunk: Chunk,
        now: Instant,
    ) -> Result<AcceptOutcome, ReassemblyError> {
        let (group_id, sequence, total, payload) = chunk.into_parts();

        match self.groups.get_mut(&group_id) {
            Some(group) => {
                if group.total() != total {
                    self.stats.rejected += 1;
                    warn!(
                        "Inconsistent total for group {}: expected {}, got {}",
                        group_id,
                        group.total(),
                        total
                    );
                    return Err(ReassemblyError::InconsistentTotal {
                        expected: group.total(),
                        actual: total,
                        group_id,
                    });
                }
                if !group.insert(sequence, payload, now) {
                    self.stats.duplicates += 1;
                    debug!("Ignoring duplicate chunk {} of group {}", sequence, group_id);
                    return Ok(AcceptOutcome::Duplicate);
                }
            }
            None => {
                // A chunk for an existing group always matches its total, so
                // the limit only needs checking when a group is opened.
                if let Some(max) = self.config.max_total.filter(|max| total > *max) {
                    self.stats.rejected += 1;
                    warn!(
                        "Rejecting chunk {} of group {}: total {} exceeds limit {}",
                        sequence, group_id, total, max
                    );
                    return Err(ReassemblyError::TooManySegments { total, max });
                }
                if let Some(max) = self
                    .config
                    .max_pending
                    .filter(|max| self.groups.len() >= *max)
                {
                    self.stats.rejected += 1;
                    warn!(
                        "Rejecting new group {}: {} groups already pending",
                        group_id,
                        self.groups.len()
                    );
                    return Err(ReassemblyError::TooManyPendingGroups { max });
                }
                let mut group = MessageGroup::new(total, now);
                group.insert(sequence, payload, now);
                debug!("Started group {} ({} chunks)", group_id, total);
                self.groups.insert(group_id.clone(), group);
            }
        }

        self.stats.accepted += 1;

        let received = self.groups.get(&group_id).map_or(0, MessageGroup::received_count);
        if received == total as usize {
            self.merge(&group_id)?;
            Ok(AcceptOutcome::Delivered)
        } else {
            Ok(AcceptOutcome::Pending { received, total })
        }
    }

    /// Parse a chunk from its JSON envelope and accept it.
    pub fn accept_json(&mut self, envelope: &str) -> Result<AcceptOutcome, ReassemblyError> {
        let chunk = Chunk::from_json(envelope).map_err(|e| {
            self.stats.rejected += 1;
            ReassemblyError::InvalidChunk(e)
        })?;
        self.accept(chunk)
    }

    /// Merge a complete group and hand the document to the consumer.
    ///
    /// Returns `Ok(false)` without touching anything if the group does not
    /// exist or is still incomplete, so calling it eagerly is harmless.
    /// Returns `Ok(true)` once the consumer has been called.
    ///
    /// A complete group is removed whatever happens next: a group whose bytes
    /// fail to decode would fail again, so it is not kept for a retry.
    pub fn merge(&mut self, group_id: &str) -> Result<bool, ReassemblyError> {
        let complete = self
            .groups
            .get(group_id)
            .is_some_and(MessageGroup::is_complete);
        if !complete {
            return Ok(false);
        }
        let Some(group) = self.groups.remove(group_id) else {
            return Ok(false);
        };

        let merged = group.assemble();
        let document = match self.codec.decode(&merged) {
            Ok(document) => document,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(
                    "Dropping group {}: merged payload failed to decode: {}",
                    group_id, e
                );
                return Err(ReassemblyError::Decode {
                    group_id: group_id.to_owned(),
                    source: e,
                });
            }
        };

        match self.consumer.as_mut() {
            Some(consumer) => {
                consumer.handle(document);
                self.stats.delivered += 1;
                debug!("Delivered group {} ({} bytes)", group_id, merged.len());
                Ok(true)
            }
            None => {
                self.stats.undelivered += 1;
                warn!("Dropping group {}: no consumer configured", group_id);
                Err(ReassemblyError::NoConsumerConfigured {
                    group_id: group_id.to_owned(),
                })
            }
        }
    }

    /// Remove every group idle for longer than `timeout`.
    ///
    /// Evicted groups are dropped without decoding or calling the consumer.
    /// Returns the number of groups removed.
    pub fn evict(&mut self, timeout: Duration) -> usize {
        self.evict_at(Instant::now(), timeout)
    }

    /// Remove every group idle for longer than `timeout` as of `now`.
    ///
    /// A group idle for exactly `timeout` is kept.
    pub fn evict_at(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.groups.len();

        self.groups.retain(|group_id, group| {
            let keep = group.idle_for(now) <= timeout;
            if !keep {
                warn!(
                    "Evicting incomplete group {} ({}/{} chunks)",
                    group_id,
                    group.received_count(),
                    group.total()
                );
            }
            keep
        });

        let evicted = before - self.groups.len();
        self.stats.evicted += evicted as u64;
        evicted
    }

    /// Evict using the configured timeout.
    pub fn evict_expired(&mut self) -> usize {
        self.evict(self.config.timeout)
    }

    /// Remove a group unconditionally.
    ///
    /// Returns `true` if the group existed.
    pub fn delete(&mut self, group_id: &str) -> bool {
        let removed = self.groups.remove(group_id).is_some();
        if removed {
            debug!("Deleted group {}", group_id);
        }
        removed
    }

    /// Get the number of incomplete groups.
    pub fn pending_count(&self) -> usize {
        self.groups.len()
    }

    /// Check if a group is being reassembled.
    pub fn contains(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    /// Number of chunks received for a group, if it exists.
    pub fn received_count(&self, group_id: &str) -> Option<usize> {
        self.groups.get(group_id).map(MessageGroup::received_count)
    }

    /// Drop all incomplete groups.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Snapshot of the registry counters.
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

/// Errors reported while reassembling.
///
/// None of these affect groups other than the one named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// Chunk announced a different total than its group; chunk dropped.
    InconsistentTotal {
        /// Group the chunk claimed to belong to.
        group_id: String,
        /// Total recorded for the group.
        expected: u32,
        /// Total announced by the chunk.
        actual: u32,
    },
    /// Merged payload is not a valid document; group dropped.
    Decode {
        /// Group that failed to decode.
        group_id: String,
        /// Codec failure.
        source: CodecError,
    },
    /// Group completed but nobody receives documents; group dropped.
    NoConsumerConfigured {
        /// Group that completed.
        group_id: String,
    },
    /// Chunk would open a group beyond the pending limit.
    TooManyPendingGroups {
        /// Configured limit.
        max: usize,
    },
    /// Chunk announced more chunks than allowed.
    TooManySegments {
        /// Announced total.
        total: u32,
        /// Configured limit.
        max: u32,
    },
    /// Envelope could not be parsed into a chunk.
    InvalidChunk(ChunkError),
}

impl std::fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InconsistentTotal {
                group_id,
                expected,
                actual,
            } => write!(
                f,
                "inconsistent total for group {}: expected {}, got {}",
                group_id, expected, actual
            ),
            Self::Decode { group_id, source } => {
                write!(f, "group {} failed to decode: {}", group_id, source)
            }
            Self::NoConsumerConfigured { group_id } => {
                write!(f, "no consumer configured for group {}", group_id)
            }
            Self::TooManyPendingGroups { max } => {
                write!(f, "too many pending groups (maximum: {})", max)
            }
            Self::TooManySegments { total, max } => {
                write!(f, "too many chunks: {} exceeds maximum {}", total, max)
            }
            Self::InvalidChunk(e) => write!(f, "invalid chunk: {}", e),
        }
    }
}

impl std::error::Error for ReassemblyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::InvalidChunk(e) => Some(e),
            _ => None,
        }
    }
}
