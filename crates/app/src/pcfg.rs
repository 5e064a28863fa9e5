//! A compact probabilistic context-free grammar for password guessing.
//!
//! Training splits every password into runs of one byte class
//! (`L`etters, `D`igits, `S`ymbols), so `dragon123!` has the structure
//! `L6 D3 S1`. Passwords are raw bytes: only ASCII letters and digits have
//! their own class, and any other byte (each byte of a UTF-8 sequence
//! included) is a symbol. Structures and the values seen for each segment are counted
//! separately; a guess's probability is the product of its structure's
//! probability and its values' probabilities.
//!
//! # Priority queue
//!
//! A pre-terminal fixes one value for every segment except the last. Popping
//! it emits that prefix joined with every known value of the last segment,
//! then pushes its children. A child advances one prefix segment to its next
//! most probable value; only segments at or after the parent's pivot are
//! advanced, so each combination is reached along exactly one path.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use guesspipe_core::{Error, GrammarModel, Guess, GuessBatch, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharClass {
    Letter,
    Digit,
    Symbol,
}

impl CharClass {
    pub fn of(byte: u8) -> Self {
        if byte.is_ascii_digit() {
            CharClass::Digit
        } else if byte.is_ascii_alphabetic() {
            CharClass::Letter
        } else {
            CharClass::Symbol
        }
    }

    fn tag(self) -> char {
        match self {
            CharClass::Letter => 'L',
            CharClass::Digit => 'D',
            CharClass::Symbol => 'S',
        }
    }
}

/// One run of a single class, `len` bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub class: CharClass,
    pub len: usize,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class.tag(), self.len)
    }
}

/// Split a password into class runs, paired with their bytes.
pub fn segment(password: &[u8]) -> Vec<(Segment, &[u8])> {
    let mut runs = Vec::new();
    let mut current: Option<(CharClass, usize, usize)> = None;

    for (offset, &byte) in password.iter().enumerate() {
        let class = CharClass::of(byte);
        if let Some((run_class, _, len)) = current.as_mut() {
            if *run_class == class {
                *len += 1;
                continue;
            }
        }
        if let Some((run_class, start, len)) = current {
            runs.push((Segment { class: run_class, len }, &password[start..offset]));
        }
        current = Some((class, offset, 1));
    }
    if let Some((class, start, len)) = current {
        runs.push((Segment { class, len }, &password[start..]));
    }
    runs
}

#[derive(Debug, Clone)]
struct Structure {
    segments: Vec<Segment>,
    probability: f64,
}

#[derive(Debug, Clone)]
struct Ranked {
    value: Guess,
    probability: f64,
}

/// A partially expanded guess: one value index per prefix segment.
#[derive(Debug, Clone)]
struct PreTerminal {
    probability: f64,
    structure: usize,
    indices: Vec<usize>,
    pivot: usize,
}

impl Ord for PreTerminal {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on probability; ties go to the earlier structure, then
        // the lower value indices
        self.probability
            .total_cmp(&other.probability)
            .then_with(|| other.structure.cmp(&self.structure))
            .then_with(|| other.indices.cmp(&self.indices))
    }
}

impl PartialOrd for PreTerminal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PreTerminal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PreTerminal {}

#[derive(Debug, Default)]
pub struct PcfgModel {
    // Training counts
    passwords_trained: u64,
    structure_counts: HashMap<Vec<Segment>, u64>,
    value_counts: HashMap<Segment, HashMap<Guess, u64>>,

    // Built by `order`
    structures: Vec<Structure>,
    values: HashMap<Segment, Vec<Ranked>>,
    queue: BinaryHeap<PreTerminal>,

    output: GuessBatch,
}

impl PcfgModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one password's structure and segment values.
    pub fn learn(&mut self, password: &[u8]) {
        let runs = segment(password);
        if runs.is_empty() {
            return;
        }

        let structure: Vec<Segment> = runs.iter().map(|(segment, _)| *segment).collect();
        *self.structure_counts.entry(structure).or_insert(0) += 1;

        for (segment, text) in runs {
            *self
                .value_counts
                .entry(segment)
                .or_default()
                .entry(text.to_vec())
                .or_insert(0) += 1;
        }
        self.passwords_trained += 1;
    }

    pub fn passwords_trained(&self) -> u64 {
        self.passwords_trained
    }

    pub fn structure_count(&self) -> usize {
        self.structure_counts.len()
    }
}

fn preterminal_probability(
    structure: &Structure,
    values: &HashMap<Segment, Vec<Ranked>>,
    indices: &[usize],
) -> f64 {
    structure
        .segments
        .iter()
        .zip(indices)
        .map(|(segment, &i)| {
            values
                .get(segment)
                .and_then(|ranked| ranked.get(i))
                .map_or(0.0, |r| r.probability)
        })
        .product::<f64>()
        * structure.probability
}

impl GrammarModel for PcfgModel {
    fn train(&mut self, corpus: &Path) -> Result<()> {
        let file = File::open(corpus).map_err(|source| Error::Corpus {
            path: corpus.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|source| Error::Corpus {
                    path: corpus.to_path_buf(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            if !line.is_empty() {
                self.learn(&line);
            }
        }

        if self.passwords_trained == 0 {
            return Err(Error::Model(format!(
                "no passwords in training corpus {}",
                corpus.display()
            )));
        }

        info!(
            passwords = self.passwords_trained,
            structures = self.structure_counts.len(),
            segments = self.value_counts.len(),
            "grammar trained"
        );
        Ok(())
    }

    fn order(&mut self) {
        let total = self.passwords_trained.max(1) as f64;

        let mut structures: Vec<Structure> = self
            .structure_counts
            .iter()
            .map(|(segments, &count)| Structure {
                segments: segments.clone(),
                probability: count as f64 / total,
            })
            .collect();
        structures.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.segments.cmp(&b.segments))
        });

        self.values = self
            .value_counts
            .iter()
            .map(|(segment, counts)| {
                let segment_total = counts.values().sum::<u64>().max(1) as f64;
                let mut ranked: Vec<(&Guess, u64)> =
                    counts.iter().map(|(value, &count)| (value, count)).collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

                let ranked: Vec<Ranked> = ranked
                    .into_iter()
                    .map(|(value, count)| Ranked {
                        value: value.clone(),
                        probability: count as f64 / segment_total,
                    })
                    .collect();
                (*segment, ranked)
            })
            .collect();

        self.queue.clear();
        for (index, structure) in structures.iter().enumerate() {
            let indices = vec![0; structure.segments.len().saturating_sub(1)];
            let probability = preterminal_probability(structure, &self.values, &indices);
            self.queue.push(PreTerminal {
                probability,
                structure: index,
                indices,
                pivot: 0,
            });
        }
        self.structures = structures;

        debug!(preterminals = self.queue.len(), "priority queue seeded");
    }

    fn pop_next(&mut self) {
        let Some(pt) = self.queue.pop() else {
            return;
        };
        let Some(structure) = self.structures.get(pt.structure) else {
            return;
        };
        let Some((last, prefix_segments)) = structure.segments.split_last() else {
            return;
        };

        let mut prefix = Vec::new();
        for (segment, &i) in prefix_segments.iter().zip(&pt.indices) {
            if let Some(ranked) = self.values.get(segment).and_then(|r| r.get(i)) {
                prefix.extend_from_slice(&ranked.value);
            }
        }

        if let Some(last_values) = self.values.get(last) {
            self.output.reserve(last_values.len());
            for ranked in last_values {
                let mut guess = Vec::with_capacity(prefix.len() + ranked.value.len());
                guess.extend_from_slice(&prefix);
                guess.extend_from_slice(&ranked.value);
                self.output.push(guess);
            }
        }

        for position in pt.pivot..prefix_segments.len() {
            let next = pt.indices[position] + 1;
            let available = self
                .values
                .get(&prefix_segments[position])
                .map_or(0, Vec::len);
            if next >= available {
                continue;
            }

            let mut indices = pt.indices.clone();
            indices[position] = next;
            let probability = preterminal_probability(structure, &self.values, &indices);
            self.queue.push(PreTerminal {
                probability,
                structure: pt.structure,
                indices,
                pivot: position,
            });
        }
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    fn guesses(&self) -> &[Guess] {
        &self.output
    }

    fn take_guesses(&mut self) -> GuessBatch {
        std::mem::take(&mut self.output)
    }
}
