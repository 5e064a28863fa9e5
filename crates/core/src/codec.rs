//! Batch codec: ordered guesses to and from a flat wire representation.
//!
//! Guesses are opaque byte strings. Nothing here assumes an encoding, so a
//! Latin-1 or binary password survives the trip unchanged.
//!
//! A batch travels in two phases so the receiver can size its buffers before
//! the bulk transfer:
//!
//! ```text
//! phase 1 (metadata)
//! +------------------+
//! | count (8)        |  u64 little-endian, one transport operation
//! +------------------+
//! | lengths (8 * n)  |  u64 little-endian per item, one transport operation
//! +------------------+
//!
//! phase 2 (payload)
//! +------------------+
//! | bytes            |  all items concatenated, no delimiters
//! +------------------+
//! ```
//!
//! The payload length must equal the sum of the declared lengths exactly.
//! Anything else is a protocol violation; the decoder never truncates or pads.

use crate::error::{CodecError, ProtocolError, Result};

/// A single guess, as raw bytes.
pub type Guess = Vec<u8>;

/// One transmission unit of guesses, in generation order.
pub type GuessBatch = Vec<Guess>;

/// Size in bytes of a single wire word.
pub const WORD_SIZE: usize = 8;

/// A batch split into its metadata and payload phases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedBatch {
    /// Byte length of every item, in order
    pub lengths: Vec<u64>,

    /// All items concatenated
    pub payload: Vec<u8>,
}

impl EncodedBatch {
    /// Number of items in the batch (the phase-1 count word).
    pub fn count(&self) -> u64 {
        self.lengths.len() as u64
    }

    /// The lengths array as it goes on the wire.
    pub fn lengths_bytes(&self) -> Vec<u8> {
        encode_words(&self.lengths)
    }
}

/// Encode a sequence of guesses.
pub fn encode_batch<S: AsRef<[u8]>>(items: &[S]) -> EncodedBatch {
    let total: usize = items.iter().map(|s| s.as_ref().len()).sum();

    let mut lengths = Vec::with_capacity(items.len());
    let mut payload = Vec::with_capacity(total);

    for item in items {
        let bytes = item.as_ref();
        lengths.push(bytes.len() as u64);
        payload.extend_from_slice(bytes);
    }

    EncodedBatch { lengths, payload }
}

/// Sum of the declared lengths, i.e. the payload size the receiver must expect.
///
/// # Errors
/// `CodecError::LengthOverflow` if the sum does not fit in a `u64`.
pub fn declared_payload_len(lengths: &[u64]) -> Result<u64> {
    lengths
        .iter()
        .try_fold(0u64, |acc, &len| acc.checked_add(len))
        .ok_or_else(|| CodecError::LengthOverflow.into())
}

/// Decode a batch from its lengths array and payload.
///
/// # Errors
/// - `CodecError::PayloadLengthMismatch` if the payload is shorter or longer
///   than the declared lengths add up to
/// - `CodecError::LengthOverflow` if the lengths cannot be summed
pub fn decode_batch(lengths: &[u64], payload: &[u8]) -> Result<GuessBatch> {
    let expected = declared_payload_len(lengths)?;
    if expected != payload.len() as u64 {
        return Err(CodecError::PayloadLengthMismatch {
            expected,
            actual: payload.len() as u64,
        }
        .into());
    }

    let mut batch = Vec::with_capacity(lengths.len());
    let mut offset = 0usize;

    for &len in lengths {
        let len = usize::try_from(len).map_err(|_| CodecError::LengthOverflow)?;
        let end = offset + len;
        batch.push(payload[offset..end].to_vec());
        offset = end;
    }

    // Lengths summed to payload.len() above, so the walk must land on the end.
    if offset != payload.len() {
        return Err(CodecError::PayloadLengthMismatch {
            expected: offset as u64,
            actual: payload.len() as u64,
        }
        .into());
    }

    Ok(batch)
}

/// Encode a single unsigned word.
pub fn encode_word(word: u64) -> [u8; WORD_SIZE] {
    word.to_le_bytes()
}

/// Decode a single unsigned word from a transport operation's bytes.
///
/// # Errors
/// `ProtocolError::InvalidWordSize` unless `bytes` is exactly one word.
pub fn decode_word(bytes: &[u8]) -> Result<u64> {
    let word: [u8; WORD_SIZE] = bytes
        .try_into()
        .map_err(|_| ProtocolError::InvalidWordSize {
            actual: bytes.len(),
        })?;
    Ok(u64::from_le_bytes(word))
}

/// Encode an array of words back to back.
pub fn encode_words(words: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * WORD_SIZE);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// Decode a lengths array announced by a count word.
///
/// # Errors
/// `CodecError::LengthsFrameMismatch` if `bytes` is not exactly `count` words.
pub fn decode_lengths(bytes: &[u8], count: u64) -> Result<Vec<u64>> {
    let expected = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(WORD_SIZE))
        .ok_or(CodecError::LengthOverflow)?;

    if bytes.len() != expected {
        return Err(CodecError::LengthsFrameMismatch {
            count,
            expected,
            actual: bytes.len(),
        }
        .into());
    }

    Ok(bytes
        .chunks_exact(WORD_SIZE)
        .map(|chunk| {
            let mut word = [0u8; WORD_SIZE];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}
