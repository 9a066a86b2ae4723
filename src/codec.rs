//! Document codec used at both ends of the pipeline.
//!
//! The registry only needs to turn merged bytes into a document and the
//! sender only needs the reverse, so the codec is a small trait. [`JsonCodec`]
//! is the implementation used everywhere in practice.

use serde_json::Value;

/// Converts documents to and from bytes.
pub trait Codec {
    /// Document type produced by [`Codec::decode`].
    type Document;

    /// Encode a document into bytes.
    fn encode(&self, document: &Self::Document) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes into a document.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Document, CodecError>;
}

/// Compact JSON codec over [`serde_json::Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Document = Value;

    fn encode(&self, document: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(document)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A document could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    message: String,
}

impl CodecError {
    /// Create an error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of what went wrong.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "codec error: {}", self.message)
    }
}

impl std::error::Error for CodecError {}
