//! Sample password corpus generation.
//!
//! When no corpus is given we generate one that looks enough like a real
//! leak for the grammar model to learn something: a small base vocabulary
//! reused heavily, common digit suffixes, the occasional symbol. Two samples
//! drawn from different seeds share vocabulary, so a model trained on one
//! cracks part of the other.
//!
//! # Shapes
//!
//! - word + digits (`dragon123`)
//! - word only (`sunshine`)
//! - digits only (`123456`)
//! - word + symbol + digits (`monkey!7`)
//! - capitalised word + year (`Summer2019`)

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::{BufWriter, Write};
use std::path::Path;

const WORDS: &[&str] = &[
    "password", "dragon", "monkey", "shadow", "sunshine", "princess", "football", "baseball",
    "letmein", "master", "welcome", "qwerty", "iloveyou", "abc", "hello", "freedom", "whatever",
    "summer", "flower", "ninja", "mustang", "charlie", "love", "secret", "pepper", "ginger",
];

const DIGIT_RUNS: &[&str] = &[
    "1", "12", "123", "1234", "12345", "123456", "007", "69", "99", "01", "2000", "11", "7",
];

const SYMBOLS: &[u8] = b"!@#$*.";

/// Generate `lines` passwords from `seed`.
pub fn generate_sample_passwords(seed: u64, lines: usize) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..lines).map(|_| sample_password(&mut rng)).collect()
}

fn sample_password(rng: &mut ChaCha8Rng) -> String {
    let word = pick(rng, WORDS);
    let shape: u8 = rng.gen_range(0..10);

    match shape {
        // 40% word + digits
        0..=3 => format!("{word}{}", pick(rng, DIGIT_RUNS)),

        // 20% bare word
        4..=5 => word.to_string(),

        // 10% digits only
        6 => {
            let run = pick(rng, DIGIT_RUNS);
            if run.len() < 4 {
                format!("{run}{run}")
            } else {
                run.to_string()
            }
        }

        // 20% word + symbol + digits
        7..=8 => {
            let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())] as char;
            format!("{word}{symbol}{}", rng.gen_range(0..10))
        }

        // 10% capitalised word + year
        _ => {
            let mut chars = word.chars();
            let capitalised: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            format!("{capitalised}{}", rng.gen_range(1970..=2024))
        }
    }
}

fn pick<'a>(rng: &mut ChaCha8Rng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or("password")
}

/// Write a generated corpus to `path`, one password per line.
pub fn write_sample_corpus(path: &Path, seed: u64, lines: usize) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for password in generate_sample_passwords(seed, lines) {
        writeln!(writer, "{password}")?;
    }
    writer.flush()
}
