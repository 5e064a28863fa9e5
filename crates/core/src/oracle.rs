//! Verification oracle: the set of known plaintext passwords.
//!
//! Built once from a bounded prefix of a line-oriented corpus and read-only
//! afterwards. Both roles that need it must load the same corpus with the
//! same bound for their results to be comparable; nothing enforces that
//! across processes.
//!
//! Lines are kept as raw bytes. Two lines match only if their bytes do.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::codec::Guess;
use crate::error::{Error, Result};

/// Default number of corpus lines loaded into the oracle.
pub const DEFAULT_ORACLE_LIMIT: usize = 1_000_000;

/// Immutable membership set of known passwords.
#[derive(Debug, Clone, Default)]
pub struct VerificationOracle {
    known: HashSet<Guess>,
    lines_read: usize,
}

impl VerificationOracle {
    /// Load the first `limit` non-blank lines of a corpus file.
    ///
    /// # Errors
    /// `Error::Corpus` if the file cannot be opened or read.
    pub fn load(path: &Path, limit: usize) -> Result<Self> {
        let corpus_err = |source| Error::Corpus {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(corpus_err)?;
        let oracle = Self::from_reader(BufReader::new(file), limit).map_err(|err| match err {
            Error::Io(source) => corpus_err(source),
            other => other,
        })?;

        info!(
            path = %path.display(),
            lines = oracle.lines_read,
            unique = oracle.len(),
            "loaded verification oracle"
        );
        Ok(oracle)
    }

    /// Read lines until EOF or `limit` lines have been taken.
    ///
    /// Line endings (`\n`, `\r\n`) are stripped, blank lines are skipped and
    /// do not count toward the limit. No other bytes are touched.
    pub fn from_reader<R: BufRead>(mut reader: R, limit: usize) -> Result<Self> {
        let mut known = HashSet::new();
        let mut lines_read = 0;
        let mut line = Vec::new();

        while lines_read < limit {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            let trimmed = trim_line_ending(&line);
            if trimmed.is_empty() {
                continue;
            }

            known.insert(trimmed.to_vec());
            lines_read += 1;
        }

        Ok(Self { known, lines_read })
    }

    /// Is `guess` a known password?
    pub fn contains(&self, guess: &[u8]) -> bool {
        self.known.contains(guess)
    }

    /// Count how many of `guesses` are known.
    pub fn count_hits<S: AsRef<[u8]>>(&self, guesses: &[S]) -> u64 {
        guesses.iter().filter(|g| self.contains(g.as_ref())).count() as u64
    }

    /// Distinct passwords in the set.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Corpus lines consumed while building the set.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}

impl<S: Into<Guess>> FromIterator<S> for VerificationOracle {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let known: HashSet<Guess> = iter.into_iter().map(Into::into).collect();
        let lines_read = known.len();
        Self { known, lines_read }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
