//! guesspipe-core: distributed password-guess generation and verification
//!
//! Two roles run as separate processes and talk only through typed messages
//! over a point-to-point transport:
//! - The **generator** drains a probabilistic grammar model and streams
//!   guesses out in batches
//! - The **verifier** checks each guess against a known-password oracle and
//!   measures digest throughput
//!
//! # Architecture
//!
//! - `codec`: batch of byte-string guesses to count/lengths/payload and back
//! - `framing`: length + CRC frames for stream transports
//! - `transport`: blocking point-to-point transports (TCP, in-process)
//! - `channel`: `Batch` / `Continuation` control messages over a transport
//! - `model`: grammar model interface
//! - `oracle`: known-password membership set
//! - `digest`: lane-batched digest for throughput measurement
//! - `generator`: generator role state machine
//! - `verifier`: verifier role loop
//! - `timing`: timestamps and end-of-run elapsed-time convergence
//! - `metrics`: per-role end-of-run reports
//!
//! # Guarantees
//!
//! - **No silent loss**: a batch either decodes exactly or is a protocol error
//! - **Bytes in, bytes out**: guesses are never re-encoded, so an oracle line
//!   matches a guess only if their bytes are identical
//! - **Drain before exit**: the verifier stops only after the termination
//!   signal, which is ordered after every batch
//! - **Bounded buffering**: the generator flushes at a fixed threshold and the
//!   in-process transport has a fixed queue depth

pub mod channel;
pub mod codec;
pub mod digest;
pub mod error;
pub mod framing;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod oracle;
pub mod timing;
pub mod transport;
pub mod verifier;

// Re-export commonly used types
pub use channel::{ControlChannel, ControlMessage};
pub use codec::{Guess, GuessBatch};
pub use digest::{LaneDigest, Md5Lanes, Sha256Lanes};
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorConfig, StopReason};
pub use metrics::{GeneratorMetrics, VerifierMetrics};
pub use model::{GrammarModel, ScriptedModel};
pub use oracle::VerificationOracle;
pub use timing::Timestamp;
pub use transport::{LocalTransport, TcpTransport, Transport};
pub use verifier::Verifier;
