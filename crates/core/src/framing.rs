//! Wire frame serialization and parsing for stream transports.
//!
//! Each transport operation on a byte stream (TCP) is carried as one frame so
//! that message boundaries survive the stream:
//!
//! ```text
//! +------------------+
//! | Magic (4 bytes)  |  0x47 0x50 0x57 0x46 ("GPWF")
//! +------------------+
//! | body_len (8)     |  u64 little-endian
//! +------------------+
//! | crc32 (4)        |  u32 checksum of body_len and body
//! +------------------+
//! | body             |  body_len bytes
//! | (variable)       |
//! +------------------+
//! ```
//!
//! The header is validated before the body is allocated, so a corrupt or
//! hostile length cannot force an unbounded allocation.

use std::io::{ErrorKind, Read, Write};

use crate::error::{FrameError, Result, TransportError};

/// Magic number for wire frames: "GPWF" (Guess Pipeline Wire Frame)
const MAGIC: [u8; 4] = [0x47, 0x50, 0x57, 0x46];

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 16;

/// Default upper bound on a single frame body (1 GiB).
pub const DEFAULT_MAX_FRAME_BYTES: u64 = 1 << 30;

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared body length
    pub body_len: u64,

    /// CRC32 over body_len and body
    pub crc32: u32,
}

impl FrameHeader {
    /// Parse and validate a header against the size limit.
    ///
    /// # Errors
    /// - `FrameError::FrameTooShort` if fewer than `HEADER_SIZE` bytes
    /// - `FrameError::InvalidMagic` if the magic doesn't match
    /// - `FrameError::FrameTooLarge` if `body_len > max_body`
    pub fn parse(bytes: &[u8], max_body: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::FrameTooShort {
                required: HEADER_SIZE,
                actual: bytes.len(),
            }
            .into());
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            }
            .into());
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[4..12]);
        let body_len = u64::from_le_bytes(len);

        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[12..16]);
        let crc32 = u32::from_le_bytes(crc);

        if body_len > max_body {
            return Err(FrameError::FrameTooLarge {
                size: body_len,
                max: max_body,
            }
            .into());
        }

        Ok(Self { body_len, crc32 })
    }

    /// Check a received body against this header.
    ///
    /// # Errors
    /// - `FrameError::BodyLengthMismatch` if the body size differs
    /// - `FrameError::Crc` if the checksum differs
    pub fn verify(&self, body: &[u8]) -> Result<()> {
        if body.len() as u64 != self.body_len {
            return Err(FrameError::BodyLengthMismatch {
                expected: self.body_len,
                actual: body.len() as u64,
            }
            .into());
        }

        let computed = compute_crc(body);
        if computed != self.crc32 {
            return Err(FrameError::Crc {
                expected: self.crc32,
                actual: computed,
            }
            .into());
        }

        Ok(())
    }
}

/// Write one frame to a stream.
///
/// Header and body are written separately so large bodies are not copied.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    writer.write_all(&header_bytes(body))?;
    writer.write_all(body)?;
    Ok(())
}

/// Read one frame from a stream.
///
/// # Errors
/// - `TransportError::Disconnected` if the stream ends before a header
/// - Frame errors for corrupt headers or bodies
pub fn read_frame<R: Read>(reader: &mut R, max_body: u64) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    if let Err(err) = reader.read_exact(&mut header) {
        return Err(match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                TransportError::Disconnected.into()
            }
            _ => err.into(),
        });
    }

    let header = FrameHeader::parse(&header, max_body)?;

    // body_len <= max_body was checked, so this fits in memory bounds we accept.
    let mut body = vec![0u8; header.body_len as usize];
    reader.read_exact(&mut body).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => TransportError::Disconnected.into(),
        _ => crate::error::Error::from(err),
    })?;

    header.verify(&body)?;
    Ok(body)
}

fn header_bytes(body: &[u8]) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..12].copy_from_slice(&(body.len() as u64).to_le_bytes());
    header[12..16].copy_from_slice(&compute_crc(body).to_le_bytes());
    header
}

/// CRC32 over the protected fields.
fn compute_crc(body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&(body.len() as u64).to_le_bytes());
    hasher.update(body);
    hasher.finalize()
}
