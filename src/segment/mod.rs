//! Chunk records and the splitter that produces them.
//!
//! This module contains the wire-level view of a chunk and the outbound half
//! of the pipeline: cutting an encoded document into envelopes that fit a
//! transport's payload limit.

mod chunk;
mod splitter;

pub use chunk::{Chunk, ChunkError, FIELD_GROUP_ID, FIELD_PAYLOAD, FIELD_SEQUENCE, FIELD_TOTAL};
pub use splitter::{overhead, split, split_document, SplitError};
