//! Wall-clock timestamps and the end-of-run elapsed-time convergence.
//!
//! The generator may stop emitting work before the verifier has drained the
//! tail of the pipeline, so the reported total spans from the generator's run
//! start to whichever role finished last:
//!
//! ```text
//! total = max(generator_end, verifier_end) - run_start
//! ```
//!
//! Timestamps are microseconds since the Unix epoch so they can cross the
//! process boundary as a single signed 64-bit word.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microsecond wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let micros = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_micros()).unwrap_or(i64::MAX),
            // Clock set before 1970
            Err(err) => -i64::try_from(err.duration().as_micros()).unwrap_or(i64::MAX),
        };
        Self(micros)
    }

    /// Build from raw microseconds since the epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Raw microseconds since the epoch.
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Wire form: signed 64-bit little-endian.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Parse the wire form.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_le_bytes(bytes))
    }

    /// Time from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        let micros = self.0.saturating_sub(earlier.0);
        Duration::from_micros(u64::try_from(micros).unwrap_or(0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0.div_euclid(1_000_000), self.0.rem_euclid(1_000_000))
    }
}

/// Total elapsed wall-clock time for a run.
///
/// Takes the later of the two end stamps rather than assuming the verifier
/// finishes last, so clock skew or a fast verifier tail cannot shorten it.
/// Clamped at zero if both ends precede `run_start`.
pub fn total_elapsed(
    run_start: Timestamp,
    generator_end: Timestamp,
    verifier_end: Timestamp,
) -> Duration {
    generator_end.max(verifier_end).saturating_since(run_start)
}
