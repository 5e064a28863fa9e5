//! Control channel: two message kinds multiplexed over one transport.
//!
//! Every message starts with a one-word discriminant sent as its own
//! transport operation. The receiver reads the discriminant first and then
//! performs exactly the reads that message kind needs:
//!
//! ```text
//! Continuation:  [1] [bool word]
//! Batch:         [2] [count] [lengths array] [payload]
//! ```
//!
//! The end-of-run timestamp is not a control message; it flows the other
//! way (verifier to generator) as one signed word after the verifier exits
//! its loop.

use tracing::trace;

use crate::codec::{
    decode_batch, decode_lengths, decode_word, encode_batch, encode_word, GuessBatch, WORD_SIZE,
};
use crate::error::{ProtocolError, Result};
use crate::timing::Timestamp;
use crate::transport::{Transport, TransportStats};

/// Wire discriminant for each control message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Discriminant {
    /// Followed by one boolean word
    Continuation = 1,
    /// Followed by a codec-encoded batch
    Batch = 2,
}

impl TryFrom<u64> for Discriminant {
    type Error = ProtocolError;

    fn try_from(word: u64) -> std::result::Result<Self, Self::Error> {
        match word {
            1 => Ok(Discriminant::Continuation),
            2 => Ok(Discriminant::Batch),
            other => Err(ProtocolError::UnknownDiscriminant(other)),
        }
    }
}

/// A message from the generator to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Guesses to verify
    Batch(GuessBatch),

    /// `false` ends the stream; nothing follows it
    Continuation(bool),
}

impl ControlMessage {
    /// The termination signal.
    pub const STOP: ControlMessage = ControlMessage::Continuation(false);
}

/// Typed message endpoint over a transport.
pub struct ControlChannel<T: Transport> {
    transport: T,
}

impl<T: Transport> ControlChannel<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send a control message.
    pub fn send(&mut self, message: &ControlMessage) -> Result<()> {
        match message {
            ControlMessage::Batch(batch) => self.send_batch(batch.as_slice()),
            ControlMessage::Continuation(flag) => self.send_continuation(*flag),
        }
    }

    /// Send a batch from a borrowed buffer.
    ///
    /// Lets the generator hand over its accumulation buffer without cloning
    /// it into a `ControlMessage` first.
    pub fn send_batch<S: AsRef<[u8]>>(&mut self, batch: &[S]) -> Result<()> {
        let encoded = encode_batch(batch);
        trace!(
            items = encoded.count(),
            payload_bytes = encoded.payload.len(),
            "sending batch"
        );

        self.send_word(Discriminant::Batch as u64)?;
        self.send_word(encoded.count())?;
        self.transport.send(&encoded.lengths_bytes())?;
        self.transport.send(&encoded.payload)
    }

    /// Send a continuation flag.
    pub fn send_continuation(&mut self, flag: bool) -> Result<()> {
        self.send_word(Discriminant::Continuation as u64)?;
        self.send_word(u64::from(flag))
    }

    /// Block until the next control message arrives.
    ///
    /// # Errors
    /// Protocol or codec errors for anything that does not parse; transport
    /// errors if the peer is gone.
    pub fn receive(&mut self) -> Result<ControlMessage> {
        let discriminant = Discriminant::try_from(self.recv_word()?)?;

        match discriminant {
            Discriminant::Batch => {
                let count = self.recv_word()?;
                let lengths = decode_lengths(&self.transport.recv()?, count)?;
                let payload = self.transport.recv()?;
                let batch = decode_batch(&lengths, &payload)?;
                trace!(items = batch.len(), payload_bytes = payload.len(), "received batch");
                Ok(ControlMessage::Batch(batch))
            }
            Discriminant::Continuation => match self.recv_word()? {
                0 => Ok(ControlMessage::Continuation(false)),
                1 => Ok(ControlMessage::Continuation(true)),
                other => Err(ProtocolError::InvalidBool(other).into()),
            },
        }
    }

    /// Send the end-of-run timestamp back to the peer.
    pub fn send_timestamp(&mut self, timestamp: Timestamp) -> Result<()> {
        self.transport.send(&timestamp.to_le_bytes())
    }

    /// Block until the peer's end-of-run timestamp arrives.
    pub fn receive_timestamp(&mut self) -> Result<Timestamp> {
        let bytes = self.transport.recv()?;
        let word: [u8; WORD_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidWordSize { actual: bytes.len() })?;
        Ok(Timestamp::from_le_bytes(word))
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn send_word(&mut self, word: u64) -> Result<()> {
        self.transport.send(&encode_word(word))
    }

    fn recv_word(&mut self) -> Result<u64> {
        decode_word(&self.transport.recv()?)
    }
}
