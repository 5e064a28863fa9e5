//! Interface to the probabilistic grammar model that produces guesses.
//!
//! The pipeline treats the model as a black box: it is trained once, ordered
//! once, then popped until the generator decides to stop. Each pop appends
//! zero or more guesses to the model's output buffer; the generator reads the
//! buffer's size after every pop and takes the whole buffer when it flushes.

use std::collections::VecDeque;
use std::path::Path;

use crate::codec::{Guess, GuessBatch};
use crate::error::Result;

/// A guess source ranked by probability.
pub trait GrammarModel {
    /// Learn from a line-oriented password corpus.
    fn train(&mut self, corpus: &Path) -> Result<()>;

    /// Arrange learned rules into the priority structure popped by `pop_next`.
    fn order(&mut self);

    /// Expand the most probable remaining rule into the output buffer.
    fn pop_next(&mut self);

    /// True once the priority structure is empty.
    fn is_exhausted(&self) -> bool;

    /// Guesses produced since the last `take_guesses`.
    fn guesses(&self) -> &[Guess];

    /// Move the output buffer out, leaving it empty.
    fn take_guesses(&mut self) -> GuessBatch;
}

/// A model that replays fixed groups of guesses, one group per pop.
///
/// Training and ordering do nothing; the model is exhausted once the last
/// group has been popped. Useful for replaying a known guess list and for
/// driving the roles deterministically.
#[derive(Debug, Default, Clone)]
pub struct ScriptedModel {
    groups: VecDeque<GuessBatch>,
    output: GuessBatch,
    pops: usize,
}

impl ScriptedModel {
    pub fn new<I, G, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = S>,
        S: Into<Guess>,
    {
        Self {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().map(Into::into).collect())
                .collect(),
            output: Vec::new(),
            pops: 0,
        }
    }

    /// Number of `pop_next` calls so far.
    pub fn pops(&self) -> usize {
        self.pops
    }
}

impl GrammarModel for ScriptedModel {
    fn train(&mut self, _corpus: &Path) -> Result<()> {
        Ok(())
    }

    fn order(&mut self) {}

    fn pop_next(&mut self) {
        self.pops += 1;
        if let Some(group) = self.groups.pop_front() {
            self.output.extend(group);
        }
    }

    fn is_exhausted(&self) -> bool {
        self.groups.is_empty()
    }

    fn guesses(&self) -> &[Guess] {
        &self.output
    }

    fn take_guesses(&mut self) -> GuessBatch {
        std::mem::take(&mut self.output)
    }
}
