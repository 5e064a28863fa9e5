//! Verifier role: scores every received guess against the oracle.
//!
//! The loop blocks on one control message at a time. Batches are scored as
//! they arrive, so by the time `Continuation(false)` is read every batch sent
//! before it has already been incorporated; the transport's ordering
//! guarantee is what makes drain-before-exit hold.

use tracing::{debug, info, warn};

use crate::channel::{ControlChannel, ControlMessage};
use crate::codec::GuessBatch;
use crate::digest::{digest_lanes, LaneDigest, Md5Lanes};
use crate::error::Result;
use crate::metrics::VerifierMetrics;
use crate::oracle::VerificationOracle;
use crate::timing::Timestamp;
use crate::transport::Transport;

/// The single verifier role.
pub struct Verifier<D: LaneDigest = Md5Lanes> {
    oracle: VerificationOracle,
    digest: D,
    pending: GuessBatch,
    metrics: VerifierMetrics,
}

impl Verifier<Md5Lanes> {
    /// A verifier timing MD5 lanes.
    pub fn new(oracle: VerificationOracle) -> Self {
        Self::with_digest(oracle, Md5Lanes)
    }
}

impl<D: LaneDigest> Verifier<D> {
    pub fn with_digest(oracle: VerificationOracle, digest: D) -> Self {
        Self {
            oracle,
            digest,
            pending: Vec::new(),
            metrics: VerifierMetrics::default(),
        }
    }

    /// Receive and score until the termination signal, then report the end
    /// timestamp back to the generator.
    pub fn run<T: Transport>(
        &mut self,
        channel: &mut ControlChannel<T>,
    ) -> Result<VerifierMetrics> {
        loop {
            match channel.receive()? {
                ControlMessage::Batch(batch) => {
                    self.process_batch(batch);
                }
                ControlMessage::Continuation(false) => break,
                ControlMessage::Continuation(true) => {
                    warn!("ignoring Continuation(true); only false ends the stream");
                }
            }
        }

        let verifier_end = Timestamp::now();
        self.metrics.verifier_end = Some(verifier_end);
        self.metrics.transport = channel.stats();
        info!(
            cracked = self.metrics.cracked,
            checked = self.metrics.guesses_checked,
            hash_secs = self.metrics.hash_time.as_secs_f64(),
            "verification finished"
        );

        channel.send_timestamp(verifier_end)?;
        Ok(self.metrics.clone())
    }

    /// Score one received batch. Returns the number of new hits.
    pub fn process_batch(&mut self, batch: GuessBatch) -> u64 {
        self.metrics.batches_received += 1;
        self.pending.extend(batch);

        let hits = self.oracle.count_hits(&self.pending);
        let timing = digest_lanes(&mut self.digest, &self.pending);

        self.metrics.cracked += hits;
        self.metrics.guesses_checked += self.pending.len() as u64;
        self.metrics.lanes += timing.lanes;
        self.metrics.hash_time += timing.elapsed;
        debug!(
            items = self.pending.len(),
            hits,
            cracked = self.metrics.cracked,
            "processed batch"
        );

        self.pending.clear();
        hits
    }

    pub fn metrics(&self) -> &VerifierMetrics {
        &self.metrics
    }
}
