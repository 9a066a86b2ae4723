//! Chunked transfer of JSON documents over size-limited transports.
//!
//! A sender encodes a document, cuts the text into [`Chunk`]s that each fit a
//! byte budget once wrapped in their JSON envelope, and ships them in any
//! order. A receiver feeds the chunks to a [`Registry`], which groups them by
//! id, merges each group once every chunk has arrived and hands the decoded
//! document to a [`Consumer`].
//!
//! ```
//! use json_segments::{split, JsonCodec, Registry};
//!
//! let mut registry = Registry::new(JsonCodec);
//! registry.set_consumer(|doc: serde_json::Value| assert_eq!(doc["ok"], true));
//!
//! for chunk in split(r#"{"ok":true}"#, "m1", 48).unwrap() {
//!     registry.accept(chunk).unwrap();
//! }
//! assert_eq!(registry.stats().delivered, 1);
//! ```

pub mod codec;
pub mod registry;
pub mod segment;

// Re-export commonly used items
pub use codec::{Codec, CodecError, JsonCodec};
pub use registry::{
    spawn_evictor, AcceptOutcome, Consumer, ReassemblyError, Registry, RegistryConfig,
    RegistryConfigError, RegistryStats, SharedRegistry,
};
pub use segment::{overhead, split, split_document, Chunk, ChunkError, SplitError};
