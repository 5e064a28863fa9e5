//! Error types for the guess pipeline.
//!
//! All operations return structured errors rather than panicking. Every
//! variant here is fatal for the role that observes it: there is no
//! cross-role error channel, so the owning role logs and exits.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Codec: batch metadata or payload that does not add up
/// - Frame: transport frame corruption (magic, CRC, size)
/// - Protocol: control channel words outside the known set
/// - Transport: connection loss or send/receive failure
/// - Corpus: training or oracle corpus missing or unreadable
#[derive(Debug, Error)]
pub enum Error {
    /// Batch codec violation (declared lengths vs. received bytes)
    #[error("batch codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport frame could not be parsed or failed its integrity check
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// Control channel received something it cannot dispatch
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport send/receive failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A corpus file could not be opened or read
    #[error("corpus {}: {source}", path.display())]
    Corpus {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Socket or other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Grammar model failure
    #[error("grammar model error: {0}")]
    Model(String),
}

impl Error {
    /// True for errors that mean the peer sent bytes we cannot trust.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Codec(_) | Error::Frame(_) | Error::Protocol(_))
    }
}

/// Batch codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Lengths frame size does not match the declared item count
    #[error("lengths frame holds {actual} bytes, expected {expected} for {count} items")]
    LengthsFrameMismatch {
        count: u64,
        expected: usize,
        actual: usize,
    },

    /// Payload size does not match the sum of declared lengths
    #[error("payload length mismatch: lengths declare {expected} bytes, got {actual}")]
    PayloadLengthMismatch { expected: u64, actual: u64 },

    /// Declared lengths overflow the address space
    #[error("declared lengths overflow")]
    LengthOverflow,
}

/// Transport frame errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Invalid magic number in frame header
    #[error("invalid frame magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Buffer too short to hold a frame header
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Frame body exceeds the configured maximum
    #[error("frame body of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: u64, max: u64 },

    /// Body length doesn't match header
    #[error("frame body length mismatch: header says {expected}, got {actual}")]
    BodyLengthMismatch { expected: u64, actual: u64 },

    /// CRC validation failed
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },
}

/// Control channel protocol errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Discriminant word outside the known message kinds
    #[error("unknown message discriminant {0}")]
    UnknownDiscriminant(u64),

    /// A single-word transport operation carried the wrong number of bytes
    #[error("expected an 8-byte word, got {actual} bytes")]
    InvalidWordSize { actual: usize },

    /// Boolean word that is neither 0 nor 1
    #[error("invalid boolean word {0}")]
    InvalidBool(u64),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the connection or dropped its end of the channel
    #[error("peer disconnected")]
    Disconnected,

    /// Could not reach the peer endpoint during bootstrap
    #[error("could not connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Endpoint address did not resolve
    #[error("endpoint {0} did not resolve to any address")]
    Unresolved(String),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
