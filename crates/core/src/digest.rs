//! Lane-batched digest evaluation used for throughput measurement.
//!
//! Guesses are grouped into fixed-width lanes (short groups padded with empty
//! inputs) and pushed through a digest. The output is never compared with
//! anything; it exists so the verifier can report how long hashing its share
//! of the pipeline would cost.
//!
//! MD5 is the default; SHA-256 is available for comparison runs.

use std::hint::black_box;
use std::time::{Duration, Instant};

use md5::Md5;
use sha2::{Digest, Sha256};

/// Number of guesses evaluated together.
pub const LANE_WIDTH: usize = 4;

/// A digest evaluated over one lane at a time.
pub trait LaneDigest {
    /// Per-lane internal hash state.
    type State;

    fn digest_lane(&mut self, lane: [&[u8]; LANE_WIDTH]) -> Self::State;
}

/// MD5 over each lane slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Lanes;

impl LaneDigest for Md5Lanes {
    type State = [[u8; 16]; LANE_WIDTH];

    fn digest_lane(&mut self, lane: [&[u8]; LANE_WIDTH]) -> Self::State {
        let mut state = [[0u8; 16]; LANE_WIDTH];
        for (slot, input) in state.iter_mut().zip(lane) {
            slot.copy_from_slice(&Md5::digest(input));
        }
        state
    }
}

/// SHA-256 over each lane slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Lanes;

impl LaneDigest for Sha256Lanes {
    type State = [[u8; 32]; LANE_WIDTH];

    fn digest_lane(&mut self, lane: [&[u8]; LANE_WIDTH]) -> Self::State {
        let mut state = [[0u8; 32]; LANE_WIDTH];
        for (slot, input) in state.iter_mut().zip(lane) {
            slot.copy_from_slice(&Sha256::digest(input));
        }
        state
    }
}

/// Result of digesting a run of guesses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneTiming {
    /// Lanes evaluated
    pub lanes: u64,

    /// Wall time spent inside the digest
    pub elapsed: Duration,
}

/// Group `guesses` into lanes and digest every lane, discarding the output.
pub fn digest_lanes<D, S>(digest: &mut D, guesses: &[S]) -> LaneTiming
where
    D: LaneDigest,
    S: AsRef<[u8]>,
{
    let start = Instant::now();
    let mut lanes = 0u64;

    for chunk in guesses.chunks(LANE_WIDTH) {
        let mut lane: [&[u8]; LANE_WIDTH] = [&[]; LANE_WIDTH];
        for (slot, guess) in lane.iter_mut().zip(chunk) {
            *slot = guess.as_ref();
        }
        black_box(digest.digest_lane(black_box(lane)));
        lanes += 1;
    }

    LaneTiming {
        lanes,
        elapsed: start.elapsed(),
    }
}
