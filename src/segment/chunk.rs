//! Chunk records and their wire envelope.
//!
//! A chunk travels as a compact JSON object:
//!
//! ```text
//! {"uid":"<group id>","seq":<sequence>,"abs":<total>,"seg":"<payload>"}
//! ```
//!
//! The field names are the ones deployed senders already emit, so they are
//! part of the interoperability surface and must not change.

use serde::Serialize;
use serde_json::{Map, Value};

/// Envelope field carrying the group id.
pub const FIELD_GROUP_ID: &str = "uid";

/// Envelope field carrying the 1-based sequence number.
pub const FIELD_SEQUENCE: &str = "seq";

/// Envelope field carrying the total number of chunks in the group.
pub const FIELD_TOTAL: &str = "abs";

/// Envelope field carrying the payload slice.
pub const FIELD_PAYLOAD: &str = "seg";

/// One fragment of a larger message.
///
/// Chunks are immutable once created. Sequence numbers and totals start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    group_id: String,
    sequence: u32,
    total: u32,
    payload: Vec<u8>,
}

impl Chunk {
    /// Create a new chunk.
    ///
    /// Returns an error if `sequence` or `total` is zero.
    pub fn new(
        group_id: impl Into<String>,
        sequence: u32,
        total: u32,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, ChunkError> {
        if sequence == 0 {
            return Err(ChunkError::InvalidField(FIELD_SEQUENCE));
        }
        if total == 0 {
            return Err(ChunkError::InvalidField(FIELD_TOTAL));
        }
        Ok(Self::from_parts(group_id.into(), sequence, total, payload.into()))
    }

    /// Build a chunk whose fields are already known to be valid.
    pub(crate) fn from_parts(
        group_id: String,
        sequence: u32,
        total: u32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            group_id,
            sequence,
            total,
            payload,
        }
    }

    /// Id of the group this chunk belongs to.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Position of this chunk within its group (1-based).
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Number of chunks in the group.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take the chunk apart without copying the payload.
    pub(crate) fn into_parts(self) -> (String, u32, u32, Vec<u8>) {
        (self.group_id, self.sequence, self.total, self.payload)
    }

    /// Parse a chunk from its JSON envelope.
    pub fn from_json(text: &str) -> Result<Self, ChunkError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ChunkError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Extract a chunk from an already parsed JSON envelope.
    ///
    /// Every field is checked: `uid` and `seg` must be strings, `seq` and
    /// `abs` must be integers in `1..=u32::MAX`.
    pub fn from_value(value: &Value) -> Result<Self, ChunkError> {
        let object = value.as_object().ok_or(ChunkError::NotAnObject)?;

        let group_id = string_field(object, FIELD_GROUP_ID)?;
        let sequence = positive_field(object, FIELD_SEQUENCE)?;
        let total = positive_field(object, FIELD_TOTAL)?;
        let payload = string_field(object, FIELD_PAYLOAD)?;

        Ok(Self::from_parts(
            group_id.to_owned(),
            sequence,
            total,
            payload.as_bytes().to_vec(),
        ))
    }

    /// Serialize the chunk to its compact JSON envelope.
    ///
    /// Fails if the payload is not valid UTF-8, since the envelope carries it
    /// as a JSON string.
    pub fn to_json(&self) -> Result<String, ChunkError> {
        let payload = std::str::from_utf8(&self.payload).map_err(|_| ChunkError::PayloadNotUtf8)?;
        Ok(WireChunk {
            uid: &self.group_id,
            seq: self.sequence,
            abs: self.total,
            seg: payload,
        }
        .encode())
    }
}

/// Borrowed view of a chunk in envelope order.
#[derive(Serialize)]
pub(crate) struct WireChunk<'a> {
    pub(crate) uid: &'a str,
    pub(crate) seq: u32,
    pub(crate) abs: u32,
    pub(crate) seg: &'a str,
}

impl WireChunk<'_> {
    /// Encode as compact JSON.
    pub(crate) fn encode(&self) -> String {
        // Only strings and integers: serialization cannot fail.
        serde_json::to_string(self)
            .expect("BUG: envelope of strings and integers failed to serialize")
    }
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ChunkError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ChunkError::InvalidField(field)),
        None => Err(ChunkError::MissingField(field)),
    }
}

fn positive_field(object: &Map<String, Value>, field: &'static str) -> Result<u32, ChunkError> {
    let value = object.get(field).ok_or(ChunkError::MissingField(field))?;
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n >= 1)
        .ok_or(ChunkError::InvalidField(field))
}

/// Errors from building, parsing or encoding chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// The envelope is not valid JSON.
    InvalidJson(String),
    /// The envelope is valid JSON but not an object.
    NotAnObject,
    /// A required envelope field is absent.
    MissingField(&'static str),
    /// An envelope field has the wrong type or an out-of-range value.
    InvalidField(&'static str),
    /// The payload cannot be carried as a JSON string.
    PayloadNotUtf8,
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(msg) => write!(f, "chunk is not valid JSON: {}", msg),
            Self::NotAnObject => write!(f, "chunk envelope is not a JSON object"),
            Self::MissingField(field) => write!(f, "chunk envelope is missing '{}'", field),
            Self::InvalidField(field) => write!(f, "chunk envelope has invalid '{}'", field),
            Self::PayloadNotUtf8 => write!(f, "chunk payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ChunkError {}
