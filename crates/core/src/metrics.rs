//! End-of-run reports for the two roles.
//!
//! Each role fills in its own report; nothing here is shared across the
//! process boundary except the verifier's end timestamp, which the generator
//! folds into `total_elapsed`.
//!
//! Reports print as free text for the operator and export as `key=value`
//! lines for scripts and tests.

use std::time::Duration;

use crate::generator::StopReason;
use crate::timing::Timestamp;
use crate::transport::TransportStats;

/// What the generator role observed over one run.
#[derive(Debug, Clone)]
pub struct GeneratorMetrics {
    // === Timing ===
    /// Model train + order time
    pub train_time: Duration,

    /// Run start to the moment the stop condition fired
    pub guess_time: Duration,

    /// Captured once, before the first pop
    pub run_start: Timestamp,

    /// Captured when the stop condition fired
    pub generator_end: Timestamp,

    /// Received from the verifier at shutdown
    pub verifier_end: Timestamp,

    /// `max(generator_end, verifier_end) - run_start`
    pub total_elapsed: Duration,

    // === Output ===
    /// Guesses handed to the verifier
    pub guesses_generated: u64,

    /// Batch messages sent
    pub batches_sent: u64,

    /// Model pops performed
    pub pops: u64,

    /// Why generation ended
    pub stop_reason: StopReason,

    /// Transport counters at shutdown
    pub transport: TransportStats,
}

impl GeneratorMetrics {
    /// Guesses per second of generation time.
    pub fn guesses_per_second(&self) -> f64 {
        let secs = self.guess_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.guesses_generated as f64 / secs
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Generator Summary ===");
        println!("Train time: {:.6} seconds", self.train_time.as_secs_f64());
        println!("Guess time: {:.6} seconds", self.guess_time.as_secs_f64());
        println!("Stopped by: {}", self.stop_reason);
        println!();
        println!("Guesses generated: {}", self.guesses_generated);
        println!("Batches sent: {}", self.batches_sent);
        println!("Model pops: {}", self.pops);
        println!(
            "Bytes sent: {} ({:.2} MiB)",
            self.transport.bytes_sent,
            self.transport.bytes_sent as f64 / 1024.0 / 1024.0
        );
        println!("Rate: {:.0} guesses/s", self.guesses_per_second());
        println!();
        println!("Total time: {:.6} seconds", self.total_elapsed.as_secs_f64());
        println!();
    }

    /// Export metrics as `key=value` lines.
    pub fn export_text(&self) -> String {
        format!(
            "train_secs={:.6}\n\
             guess_secs={:.6}\n\
             total_secs={:.6}\n\
             run_start_us={}\n\
             generator_end_us={}\n\
             verifier_end_us={}\n\
             guesses_generated={}\n\
             batches_sent={}\n\
             pops={}\n\
             stop_reason={}\n\
             bytes_sent={}\n",
            self.train_time.as_secs_f64(),
            self.guess_time.as_secs_f64(),
            self.total_elapsed.as_secs_f64(),
            self.run_start.as_micros(),
            self.generator_end.as_micros(),
            self.verifier_end.as_micros(),
            self.guesses_generated,
            self.batches_sent,
            self.pops,
            self.stop_reason,
            self.transport.bytes_sent,
        )
    }
}

/// What the verifier role observed over one run.
#[derive(Debug, Clone, Default)]
pub struct VerifierMetrics {
    /// Batch messages received
    pub batches_received: u64,

    /// Guesses tested against the oracle
    pub guesses_checked: u64,

    /// Guesses found in the oracle
    pub cracked: u64,

    /// Digest lanes evaluated
    pub lanes: u64,

    /// Time spent in the digest
    pub hash_time: Duration,

    /// Captured after the last batch was processed
    pub verifier_end: Option<Timestamp>,

    /// Transport counters at shutdown
    pub transport: TransportStats,
}

impl VerifierMetrics {
    /// Guesses digested per second of hash time.
    pub fn hashes_per_second(&self) -> f64 {
        let secs = self.hash_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.guesses_checked as f64 / secs
        }
    }

    /// Fraction of checked guesses that were cracked.
    pub fn crack_rate(&self) -> f64 {
        if self.guesses_checked == 0 {
            0.0
        } else {
            self.cracked as f64 / self.guesses_checked as f64
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Verifier Summary ===");
        println!("Hash time: {:.6} seconds", self.hash_time.as_secs_f64());
        println!("Cracked: {}", self.cracked);
        println!();
        println!("Batches received: {}", self.batches_received);
        println!("Guesses checked: {}", self.guesses_checked);
        println!("Crack rate: {:.4}%", self.crack_rate() * 100.0);
        println!("Lanes digested: {}", self.lanes);
        println!("Rate: {:.0} hashes/s", self.hashes_per_second());
        println!();
    }

    /// Export metrics as `key=value` lines.
    pub fn export_text(&self) -> String {
        format!(
            "hash_secs={:.6}\n\
             cracked={}\n\
             batches_received={}\n\
             guesses_checked={}\n\
             lanes={}\n\
             verifier_end_us={}\n\
             bytes_received={}\n",
            self.hash_time.as_secs_f64(),
            self.cracked,
            self.batches_received,
            self.guesses_checked,
            self.lanes,
            self.verifier_end.map_or(0, Timestamp::as_micros),
            self.transport.bytes_received,
        )
    }
}
