//! Point-to-point transports between the two pipeline roles.
//!
//! A transport moves opaque byte messages in send order, with blocking
//! `send` and `recv`. One call is one transport operation; the control
//! channel layers its discriminant/metadata/payload sequence on top.
//!
//! # Implementations
//!
//! - **`TcpTransport`**: the cross-process transport. Each operation is one
//!   `framing` frame on a TCP stream.
//! - **`LocalTransport`**: a pair of bounded queues for running both roles
//!   in one process (tests, `local` mode). A full queue blocks the sender,
//!   which is the same backpressure a slow peer applies over TCP.
//!
//! Neither implementation retries once the run has started; a lost peer is
//! fatal for the role that notices it.

use std::io::{BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};

/// Default queue depth (in transport operations) for `LocalTransport`.
pub const DEFAULT_LOCAL_CAPACITY: usize = 32;

/// A blocking, ordered, point-to-point message transport.
pub trait Transport {
    /// Send one message. Blocks while the transport applies backpressure.
    fn send(&mut self, message: &[u8]) -> Result<()>;

    /// Receive the next message in send order. Blocks until one arrives.
    fn recv(&mut self) -> Result<Vec<u8>>;

    /// Counters for this endpoint.
    fn stats(&self) -> TransportStats;
}

/// Statistics about traffic through one transport endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Messages sent from this endpoint
    pub frames_sent: u64,

    /// Message bytes sent (excluding framing overhead)
    pub bytes_sent: u64,

    /// Messages received at this endpoint
    pub frames_received: u64,

    /// Message bytes received (excluding framing overhead)
    pub bytes_received: u64,
}

impl TransportStats {
    fn record_send(&mut self, len: usize) {
        self.frames_sent += 1;
        self.bytes_sent += len as u64;
    }

    fn record_recv(&mut self, len: usize) {
        self.frames_received += 1;
        self.bytes_received += len as u64;
    }
}

/// Bootstrap settings for dialing the verifier endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ConnectConfig {
    /// Connection attempts before giving up
    pub attempts: u32,

    /// Delay between attempts
    pub retry_delay: Duration,

    /// Largest frame body accepted from the peer
    pub max_frame_bytes: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            attempts: 50,
            retry_delay: Duration::from_millis(200),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Blocking TCP transport carrying one frame per operation.
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
    max_frame_bytes: u64,
    stats: TransportStats,
}

impl TcpTransport {
    /// Wrap an established stream.
    pub fn from_stream(stream: TcpStream, max_frame_bytes: u64) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);

        Ok(Self {
            reader,
            writer,
            peer,
            max_frame_bytes,
            stats: TransportStats::default(),
        })
    }

    /// Dial a peer endpoint, retrying while it comes up.
    ///
    /// Retries only cover process bootstrap; once connected, failures are
    /// reported, never retried.
    ///
    /// # Errors
    /// - `TransportError::Unresolved` if `addr` resolves to nothing
    /// - `TransportError::Connect` once all attempts are used up
    pub fn connect(addr: &str, config: ConnectConfig) -> Result<Self> {
        let targets: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        if targets.is_empty() {
            return Err(TransportError::Unresolved(addr.to_string()).into());
        }

        let attempts = config.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect(&targets[..]) {
                Ok(stream) => {
                    info!(peer = %addr, attempt, "connected to peer");
                    return Self::from_stream(stream, config.max_frame_bytes);
                }
                Err(source) if attempt >= attempts => {
                    return Err(TransportError::Connect {
                        addr: addr.to_string(),
                        attempts,
                        source,
                    }
                    .into());
                }
                Err(err) => {
                    debug!(peer = %addr, attempt, error = %err, "peer not reachable yet");
                    thread::sleep(config.retry_delay);
                }
            }
        }
    }

    /// Accept exactly one peer on a bound listener.
    pub fn accept(listener: &TcpListener, max_frame_bytes: u64) -> Result<Self> {
        let (stream, peer) = listener.accept()?;
        info!(%peer, "accepted peer");
        Self::from_stream(stream, max_frame_bytes)
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        write_frame(&mut self.writer, message)?;
        self.writer.flush()?;
        self.stats.record_send(message.len());
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        let message = read_frame(&mut self.reader, self.max_frame_bytes)?;
        self.stats.record_recv(message.len());
        Ok(message)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

/// In-process transport endpoint backed by bounded queues.
pub struct LocalTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    stats: TransportStats,
}

impl LocalTransport {
    /// Create two connected endpoints. Each direction holds at most
    /// `capacity` undelivered messages.
    pub fn pair(capacity: usize) -> (LocalTransport, LocalTransport) {
        let (a_tx, b_rx) = bounded(capacity);
        let (b_tx, a_rx) = bounded(capacity);

        (
            LocalTransport {
                tx: a_tx,
                rx: a_rx,
                stats: TransportStats::default(),
            },
            LocalTransport {
                tx: b_tx,
                rx: b_rx,
                stats: TransportStats::default(),
            },
        )
    }

    /// Messages sent by the peer and not yet received here.
    pub fn pending_count(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for LocalTransport {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.tx
            .send(message.to_vec())
            .map_err(|_| TransportError::Disconnected)?;
        self.stats.record_send(message.len());
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        let message = self.rx.recv().map_err(|_| TransportError::Disconnected)?;
        self.stats.record_recv(message.len());
        Ok(message)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}
