//! Generator role: drains the grammar model and streams guesses out.
//!
//! # State machine
//!
//! ```text
//! Training ──> Generating <──> Flushing
//!                  │
//!                  └──> Stopped (terminal, entered once)
//! ```
//!
//! After every pop the generator checks, in order:
//! 1. Progress: once `progress_interval` new guesses have accumulated since
//!    the last mark, log progress and move the mark. The budget is checked
//!    only here.
//! 2. Flush: if the mark is past `flush_threshold` (strictly greater), send
//!    the whole buffer as one batch and reset the counters.
//! 3. Exhaustion: an empty priority structure stops the run.
//!
//! On stop the remaining buffer is sent as a final batch, followed by the
//! single `Continuation(false)`, and the generator blocks for the
//! verifier's end timestamp.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::channel::{ControlChannel, ControlMessage};
use crate::error::{Error, Result};
use crate::metrics::GeneratorMetrics;
use crate::model::GrammarModel;
use crate::timing::{self, Timestamp};
use crate::transport::Transport;

/// Buffered guesses that trigger a flush (strictly more than this).
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1_000_000;

/// New guesses between progress observations.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100_000;

/// Total guesses after which generation stops.
pub const DEFAULT_GENERATION_BUDGET: usize = 10_000_000;

/// Thresholds for one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub flush_threshold: usize,
    pub progress_interval: usize,
    pub generation_budget: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            generation_budget: DEFAULT_GENERATION_BUDGET,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(Error::Config("progress interval must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Training,
    Generating,
    Flushing,
    Stopped,
}

/// Why the generator entered `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Generated total exceeded the budget
    Budget,
    /// The model ran out of rules
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Budget => f.write_str("budget"),
            StopReason::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Per-run generator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Guesses in the current (unflushed) buffer
    pub total_generated: usize,

    /// Buffer size at the last progress mark
    pub since_last_flush: usize,

    /// Guesses already flushed
    pub history_generated: usize,
}

impl RunCounters {
    /// Everything generated so far, flushed or not.
    pub fn overall(&self) -> usize {
        self.history_generated + self.total_generated
    }
}

/// The single generator role.
pub struct Generator<M: GrammarModel> {
    model: M,
    config: GeneratorConfig,
    state: GeneratorState,
    counters: RunCounters,
    batches_sent: u64,
    pops: u64,
}

impl<M: GrammarModel> Generator<M> {
    pub fn new(model: M, config: GeneratorConfig) -> Self {
        Self {
            model,
            config,
            state: GeneratorState::Training,
            counters: RunCounters::default(),
            batches_sent: 0,
            pops: 0,
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Train and order the model, then enter `Generating`.
    pub fn train(&mut self, corpus: &Path) -> Result<Duration> {
        let start = Instant::now();
        self.model.train(corpus)?;
        self.model.order();
        let elapsed = start.elapsed();

        info!(secs = elapsed.as_secs_f64(), corpus = %corpus.display(), "model trained");
        self.state = GeneratorState::Generating;
        Ok(elapsed)
    }

    /// Run the whole role: train, generate until a stop condition, send the
    /// termination signal, then converge timing with the verifier.
    pub fn run<T: Transport>(
        &mut self,
        corpus: &Path,
        channel: &mut ControlChannel<T>,
    ) -> Result<GeneratorMetrics> {
        self.config.validate()?;
        let train_time = self.train(corpus)?;

        let run_start = Timestamp::now();
        let (stop_reason, generator_end) = loop {
            if let Some(stop) = self.step(channel)? {
                break stop;
            }
        };
        let guess_time = generator_end.saturating_since(run_start);
        info!(
            reason = %stop_reason,
            generated = self.counters.overall(),
            guess_secs = guess_time.as_secs_f64(),
            "generation stopped"
        );

        self.stop(channel)?;

        let verifier_end = channel.receive_timestamp()?;
        let total_elapsed = timing::total_elapsed(run_start, generator_end, verifier_end);
        info!(total_secs = total_elapsed.as_secs_f64(), "verifier finished");

        Ok(GeneratorMetrics {
            train_time,
            guess_time,
            run_start,
            generator_end,
            verifier_end,
            total_elapsed,
            guesses_generated: self.counters.history_generated as u64,
            batches_sent: self.batches_sent,
            pops: self.pops,
            stop_reason,
            transport: channel.stats(),
        })
    }

    /// One pop plus the progress, flush and exhaustion checks.
    ///
    /// Returns the stop reason and end stamp once a stop condition fires.
    fn step<T: Transport>(
        &mut self,
        channel: &mut ControlChannel<T>,
    ) -> Result<Option<(StopReason, Timestamp)>> {
        self.model.pop_next();
        self.pops += 1;
        self.counters.total_generated = self.model.guesses().len();

        let mut stop = None;

        let fresh = self
            .counters
            .total_generated
            .saturating_sub(self.counters.since_last_flush);
        if fresh >= self.config.progress_interval {
            self.counters.since_last_flush = self.counters.total_generated;
            info!(generated = self.counters.overall(), "guesses generated");

            if self.counters.overall() > self.config.generation_budget {
                stop = Some((StopReason::Budget, Timestamp::now()));
            }
        }

        if self.counters.since_last_flush > self.config.flush_threshold {
            self.flush(channel)?;
        }

        if stop.is_none() && self.model.is_exhausted() {
            stop = Some((StopReason::Exhausted, Timestamp::now()));
        }

        Ok(stop)
    }

    /// Hand the whole buffer to the verifier and reset the counters.
    fn flush<T: Transport>(&mut self, channel: &mut ControlChannel<T>) -> Result<()> {
        self.state = GeneratorState::Flushing;

        let batch = self.model.take_guesses();
        channel.send_batch(&batch)?;

        self.counters.history_generated += batch.len();
        self.counters.total_generated = 0;
        self.counters.since_last_flush = 0;
        self.batches_sent += 1;
        debug!(
            items = batch.len(),
            history = self.counters.history_generated,
            "flushed batch"
        );

        self.state = GeneratorState::Generating;
        Ok(())
    }

    /// Send the tail and the termination signal. Entered exactly once.
    fn stop<T: Transport>(&mut self, channel: &mut ControlChannel<T>) -> Result<()> {
        if !self.model.guesses().is_empty() {
            self.flush(channel)?;
        }
        channel.send(&ControlMessage::STOP)?;
        self.state = GeneratorState::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;
    use crate::transport::LocalTransport;

    fn guesses(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    /// Run a generator against a peer that has already queued its end stamp,
    /// then collect everything the generator sent.
    fn run_scripted(
        groups: Vec<Vec<String>>,
        config: GeneratorConfig,
    ) -> (GeneratorMetrics, Vec<ControlMessage>, GeneratorState) {
        let (gen_side, peer_side) = LocalTransport::pair(1024);
        let mut channel = ControlChannel::new(gen_side);
        let mut peer = ControlChannel::new(peer_side);

        peer.send_timestamp(Timestamp::now()).unwrap();

        let mut generator = Generator::new(ScriptedModel::new(groups), config);
        let metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

        let mut messages = Vec::new();
        loop {
            let message = peer.receive().unwrap();
            let done = message == ControlMessage::STOP;
            messages.push(message);
            if done {
                break;
            }
        }
        assert_eq!(peer.transport_mut().pending_count(), 0);

        (metrics, messages, generator.state())
    }

    fn batch_sizes(messages: &[ControlMessage]) -> Vec<usize> {
        messages
            .iter()
            .filter_map(|m| match m {
                ControlMessage::Batch(b) => Some(b.len()),
                ControlMessage::Continuation(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_flush_threshold_is_strict() {
        let config = GeneratorConfig {
            flush_threshold: 10,
            progress_interval: 1,
            generation_budget: 1_000,
        };
        let groups = vec![guesses("a", 10), guesses("b", 1), guesses("c", 3)];

        let (metrics, messages, _) = run_scripted(groups, config);

        // 10 is not > 10; the eleventh guess triggers the flush
        assert_eq!(batch_sizes(&messages), vec![11, 3]);
        assert_eq!(metrics.guesses_generated, 14);
        assert_eq!(metrics.batches_sent, 2);
    }

    #[test]
    fn test_flush_waits_for_progress_mark() {
        let config = GeneratorConfig {
            flush_threshold: 3,
            progress_interval: 5,
            generation_budget: 1_000,
        };
        // After the first pop the buffer holds 4 > 3, but no progress mark
        // has been set yet, so nothing is flushed until the second pop.
        let groups = vec![guesses("a", 4), guesses("b", 2), guesses("c", 1)];

        let (_, messages, _) = run_scripted(groups, config);
        assert_eq!(batch_sizes(&messages), vec![6, 1]);
    }

    #[test]
    fn test_budget_stop() {
        let config = GeneratorConfig {
            flush_threshold: 100,
            progress_interval: 1,
            generation_budget: 5,
        };
        let groups: Vec<_> = (0..10).map(|i| guesses(&format!("g{i}-"), 3)).collect();

        let (metrics, messages, state) = run_scripted(groups, config);

        assert_eq!(metrics.stop_reason, StopReason::Budget);
        assert_eq!(metrics.pops, 2);
        assert_eq!(batch_sizes(&messages), vec![6]);
        assert_eq!(state, GeneratorState::Stopped);
    }

    #[test]
    fn test_exhaustion_stop_sends_one_stop() {
        let groups = vec![guesses("x", 4), guesses("y", 3)];

        let (metrics, messages, state) = run_scripted(groups, GeneratorConfig::default());

        assert_eq!(metrics.stop_reason, StopReason::Exhausted);
        assert_eq!(metrics.guesses_generated, 7);
        assert_eq!(batch_sizes(&messages), vec![7]);
        let stops = messages
            .iter()
            .filter(|m| **m == ControlMessage::STOP)
            .count();
        assert_eq!(stops, 1);
        assert_eq!(state, GeneratorState::Stopped);
    }

    #[test]
    fn test_empty_model_sends_only_stop() {
        let (metrics, messages, _) = run_scripted(vec![], GeneratorConfig::default());

        assert_eq!(messages, vec![ControlMessage::STOP]);
        assert_eq!(metrics.guesses_generated, 0);
        assert_eq!(metrics.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn test_total_elapsed_uses_later_end() {
        let (gen_side, peer_side) = LocalTransport::pair(64);
        let mut channel = ControlChannel::new(gen_side);
        let mut peer = ControlChannel::new(peer_side);

        // Verifier reports an end 5 seconds in the future
        let late = Timestamp::from_micros(Timestamp::now().as_micros() + 5_000_000);
        peer.send_timestamp(late).unwrap();

        let mut generator = Generator::new(
            ScriptedModel::new([vec!["only"]]),
            GeneratorConfig::default(),
        );
        let metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

        assert_eq!(metrics.verifier_end, late);
        assert!(metrics.total_elapsed >= Duration::from_secs(4));
        assert!(metrics.total_elapsed >= metrics.guess_time);
    }

    #[test]
    fn test_zero_progress_interval_rejected() {
        let (gen_side, _peer) = LocalTransport::pair(4);
        let mut channel = ControlChannel::new(gen_side);
        let config = GeneratorConfig {
            progress_interval: 0,
            ..GeneratorConfig::default()
        };

        let mut generator = Generator::new(ScriptedModel::default(), config);
        let result = generator.run(Path::new("scripted"), &mut channel);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
