//! Splitting outgoing documents into size-bounded chunks.
//!
//! The budget applies to the encoded envelope, not just the payload. The
//! envelope overhead is measured once per call by encoding an empty chunk
//! with the real group id and placeholder sequence/total values, then
//! subtracted from the budget to get the payload size.
//!
//! # Overhead approximation
//!
//! The placeholders are single digits. When the real sequence or total needs
//! more digits, each affected envelope grows by those extra digits and can
//! overshoot the budget slightly. Payload characters that JSON must escape
//! (`"`, `\` and control characters) grow the envelope in the same way. Pick
//! a budget with some headroom when either matters.
//!
//! # Example
//!
//! ```
//! use json_segments::segment::{overhead, split};
//!
//! let budget = overhead("g1") + 4;
//! let chunks = split("AAAABBBBCCCC", "g1", budget).unwrap();
//!
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].payload(), b"BBBB");
//! assert_eq!(chunks[1].total(), 3);
//! ```

use super::chunk::{Chunk, WireChunk};
use crate::codec::{Codec, CodecError};

/// Placeholder sequence/total used when measuring envelope overhead.
const PLACEHOLDER_COUNT: u32 = 0;

/// Encoded size of an empty-payload envelope for `group_id`.
pub fn overhead(group_id: &str) -> usize {
    WireChunk {
        uid: group_id,
        seq: PLACEHOLDER_COUNT,
        abs: PLACEHOLDER_COUNT,
        seg: "",
    }
    .encode()
    .len()
}

/// Split `text` into chunks whose envelopes fit `budget` bytes.
///
/// Chunks are numbered `1..=total` in text order and their payloads
/// partition `text` exactly. Boundaries never fall inside a UTF-8 character,
/// so for ASCII text `total == ceil(len / (budget - overhead))`.
///
/// # Errors
///
/// - [`SplitError::BudgetTooSmall`] if `budget` does not exceed the envelope
///   overhead, or a single character does not fit the payload space
/// - [`SplitError::EmptyText`] if `text` is empty
pub fn split(text: &str, group_id: &str, budget: usize) -> Result<Vec<Chunk>, SplitError> {
    let overhead = overhead(group_id);
    if budget <= overhead {
        return Err(SplitError::BudgetTooSmall { budget, overhead });
    }
    if text.is_empty() {
        return Err(SplitError::EmptyText);
    }

    let max_payload = budget - overhead;
    let mut bounds = Vec::with_capacity(text.len().div_ceil(max_payload));
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_payload).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            return Err(SplitError::BudgetTooSmall { budget, overhead });
        }
        bounds.push(start..end);
        start = end;
    }

    let total = u32::try_from(bounds.len()).map_err(|_| SplitError::TooManyChunks(bounds.len()))?;

    Ok(bounds
        .into_iter()
        .zip(1..=total)
        .map(|(range, sequence)| {
            Chunk::from_parts(
                group_id.to_owned(),
                sequence,
                total,
                text.as_bytes()[range].to_vec(),
            )
        })
        .collect())
}

/// Encode `document` with `codec` and split the result.
pub fn split_document<C: Codec>(
    codec: &C,
    document: &C::Document,
    group_id: &str,
    budget: usize,
) -> Result<Vec<Chunk>, SplitError> {
    let bytes = codec.encode(document).map_err(SplitError::Codec)?;
    let text = String::from_utf8(bytes).map_err(|_| SplitError::NotUtf8)?;
    split(&text, group_id, budget)
}

/// Errors that can occur while splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// Budget leaves no room for payload after the envelope overhead.
    BudgetTooSmall {
        /// Requested budget in bytes.
        budget: usize,
        /// Envelope overhead in bytes.
        overhead: usize,
    },
    /// Nothing to split.
    EmptyText,
    /// Chunk count does not fit the sequence field.
    TooManyChunks(usize),
    /// The codec failed to encode the document.
    Codec(CodecError),
    /// The encoded document is not valid UTF-8.
    NotUtf8,
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetTooSmall { budget, overhead } => write!(
                f,
                "budget of {} bytes is too small (envelope overhead: {} bytes)",
                budget, overhead
            ),
            Self::EmptyText => write!(f, "cannot split empty text"),
            Self::TooManyChunks(count) => write!(f, "too many chunks: {}", count),
            Self::Codec(e) => write!(f, "failed to encode document: {}", e),
            Self::NotUtf8 => write!(f, "encoded document is not valid UTF-8"),
        }
    }
}

impl std::error::Error for SplitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}
