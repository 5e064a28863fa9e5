//! Command-line configuration for the guesspipe binary.
//!
//! Each role runs as its own subcommand. With no subcommand at all the binary
//! runs both roles in-process on a generated sample corpus, so a zero-argument
//! run always works. Randomized inputs come from a seed that is printed with
//! `--print-config`, so any run can be reproduced.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand, ValueEnum};
use guesspipe_core::framing::DEFAULT_MAX_FRAME_BYTES;
use guesspipe_core::generator::{
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_GENERATION_BUDGET, DEFAULT_PROGRESS_INTERVAL,
};
use guesspipe_core::oracle::DEFAULT_ORACLE_LIMIT;
use guesspipe_core::transport::{ConnectConfig, DEFAULT_LOCAL_CAPACITY};
use guesspipe_core::GeneratorConfig;

/// Lines in a generated sample corpus.
pub const DEFAULT_SAMPLE_LINES: usize = 20_000;

#[derive(Parser, Debug, Clone)]
#[command(name = "guesspipe", version)]
#[command(about = "Distributed password-guess generation and verification")]
pub struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Print resolved configuration before running
    #[arg(long, global = true)]
    pub print_config: bool,

    /// Don't print the end-of-run summary
    #[arg(long, global = true)]
    pub no_metrics: bool,

    /// Largest accepted wire frame in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: u64,

    /// Also write the end-of-run metrics as key=value lines to this file
    #[arg(long, global = true)]
    pub metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Listen for a generator and verify its guesses
    Verifier(VerifierArgs),

    /// Train on a corpus and stream guesses to a verifier
    Generator(GeneratorArgs),

    /// Run both roles in this process over an in-memory transport
    Local(LocalArgs),

    /// Write a seeded sample password corpus
    SampleCorpus(SampleCorpusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct VerifierArgs {
    /// Address to listen on
    #[arg(long, env = "GUESSPIPE_VERIFIER_ADDR", default_value = "127.0.0.1:7878")]
    pub listen: String,

    /// Known-password list, one per line
    #[arg(long)]
    pub oracle: PathBuf,

    /// Maximum oracle entries to load
    #[arg(long, default_value_t = DEFAULT_ORACLE_LIMIT)]
    pub oracle_limit: usize,

    /// Digest timed over each lane of guesses
    #[arg(long, value_enum, default_value_t = DigestKind::Md5)]
    pub digest: DigestKind,
}

/// Lane digest used for the verifier's throughput measurement.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestKind {
    #[default]
    Md5,
    Sha256,
}

impl DigestKind {
    pub fn name(self) -> &'static str {
        match self {
            DigestKind::Md5 => "md5",
            DigestKind::Sha256 => "sha256",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GeneratorArgs {
    /// Verifier address to connect to
    #[arg(long, env = "GUESSPIPE_VERIFIER_ADDR", default_value = "127.0.0.1:7878")]
    pub connect: String,

    /// Training corpus, one password per line
    #[arg(long)]
    pub corpus: PathBuf,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = 50)]
    pub connect_attempts: u32,

    /// Delay between connection attempts
    #[arg(long, default_value_t = 200)]
    pub connect_retry_ms: u64,
}

impl GeneratorArgs {
    pub fn connect_config(&self, max_frame_bytes: u64) -> ConnectConfig {
        ConnectConfig {
            attempts: self.connect_attempts,
            retry_delay: Duration::from_millis(self.connect_retry_ms),
            max_frame_bytes,
        }
    }
}

/// Generator thresholds shared by `generator` and `local`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ThresholdArgs {
    /// Stop once more than this many guesses have been generated
    #[arg(long, default_value_t = DEFAULT_GENERATION_BUDGET)]
    pub budget: usize,

    /// Flush once more than this many guesses are buffered
    #[arg(long, default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    pub flush_threshold: usize,

    /// New guesses between progress observations
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: usize,
}

impl Default for ThresholdArgs {
    fn default() -> Self {
        Self {
            budget: DEFAULT_GENERATION_BUDGET,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ThresholdArgs {
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            flush_threshold: self.flush_threshold,
            progress_interval: self.progress_interval,
            generation_budget: self.budget,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LocalArgs {
    /// Training corpus (default: generate a sample)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Known-password list (default: generate a second sample)
    #[arg(long)]
    pub oracle: Option<PathBuf>,

    /// Seed for generated samples (default: time-based)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Lines per generated sample
    #[arg(long)]
    pub sample_lines: Option<usize>,

    /// Maximum oracle entries to load
    #[arg(long)]
    pub oracle_limit: Option<usize>,

    /// In-memory transport depth in frames
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Digest timed over each lane of guesses (default: md5)
    #[arg(long, value_enum)]
    pub digest: Option<DigestKind>,

    /// Directory for generated samples (default: system temp dir)
    #[arg(long)]
    pub sample_dir: Option<PathBuf>,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SampleCorpusArgs {
    /// Output path
    #[arg(long)]
    pub out: PathBuf,

    /// Random seed (default: time-based)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of passwords to write
    #[arg(long, default_value_t = DEFAULT_SAMPLE_LINES)]
    pub lines: usize,
}

/// Fully resolved configuration for an in-process run.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Training corpus path, or where the generated one is written
    pub corpus: PathBuf,

    /// True if `corpus` must be generated first
    pub generate_corpus: bool,

    /// Oracle path, or where the generated one is written
    pub oracle: PathBuf,

    /// True if `oracle` must be generated first
    pub generate_oracle: bool,

    pub seed: u64,
    pub sample_lines: usize,
    pub oracle_limit: usize,
    pub capacity: usize,
    pub digest: DigestKind,
    pub generator: GeneratorConfig,
}

impl LocalArgs {
    /// Fill in every default. Generated samples are named after the seed.
    pub fn resolve(&self) -> LocalConfig {
        let seed = self.seed.unwrap_or_else(time_seed);
        let dir = self.sample_dir.clone().unwrap_or_else(std::env::temp_dir);

        let (corpus, generate_corpus) = match &self.corpus {
            Some(path) => (path.clone(), false),
            None => (dir.join(format!("guesspipe-{seed}-train.txt")), true),
        };
        let (oracle, generate_oracle) = match &self.oracle {
            Some(path) => (path.clone(), false),
            None => (dir.join(format!("guesspipe-{seed}-leak.txt")), true),
        };

        LocalConfig {
            corpus,
            generate_corpus,
            oracle,
            generate_oracle,
            seed,
            sample_lines: self.sample_lines.unwrap_or(DEFAULT_SAMPLE_LINES),
            oracle_limit: self.oracle_limit.unwrap_or(DEFAULT_ORACLE_LIMIT),
            capacity: self.capacity.unwrap_or(DEFAULT_LOCAL_CAPACITY),
            digest: self.digest.unwrap_or_default(),
            generator: self.thresholds.generator_config(),
        }
    }
}

impl LocalConfig {
    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Mode: local (both roles in-process)");
        println!("Seed: {}", self.seed);
        println!(
            "Corpus: {}{}",
            self.corpus.display(),
            if self.generate_corpus { " (generated)" } else { "" }
        );
        println!(
            "Oracle: {}{}",
            self.oracle.display(),
            if self.generate_oracle { " (generated)" } else { "" }
        );
        if self.generate_corpus || self.generate_oracle {
            println!("Sample lines: {}", self.sample_lines);
        }
        println!("Oracle limit: {}", self.oracle_limit);
        println!("Transport depth: {} frames", self.capacity);
        println!("Digest: {}", self.digest.name());
        println!();
        print_generator_config(&self.generator);
    }
}

impl Cli {
    /// The subcommand to run; none means a default local run.
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Local(LocalArgs::default()))
    }

    /// Print configuration for the network roles.
    pub fn print(&self, command: &Command) {
        match command {
            Command::Verifier(args) => {
                println!("=== Configuration ===");
                println!("Mode: verifier");
                println!("Listen: {}", args.listen);
                println!("Oracle: {}", args.oracle.display());
                println!("Oracle limit: {}", args.oracle_limit);
                println!("Digest: {}", args.digest.name());
                println!("Max frame: {} bytes", self.max_frame_bytes);
                println!();
            }
            Command::Generator(args) => {
                println!("=== Configuration ===");
                println!("Mode: generator");
                println!("Connect: {}", args.connect);
                println!("Corpus: {}", args.corpus.display());
                println!(
                    "Connect retry: {} attempts, {} ms apart",
                    args.connect_attempts, args.connect_retry_ms
                );
                println!("Max frame: {} bytes", self.max_frame_bytes);
                println!();
                print_generator_config(&args.thresholds.generator_config());
            }
            Command::Local(_) | Command::SampleCorpus(_) => {}
        }
    }
}

fn print_generator_config(config: &GeneratorConfig) {
    println!("=== Generator ===");
    println!("Budget: {} guesses", config.generation_budget);
    println!("Flush threshold: {} guesses", config.flush_threshold);
    println!("Progress interval: {} guesses", config.progress_interval);
    println!();
}

/// Seed derived from the wall clock, for runs without `--seed`.
pub fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_zero_args_is_local() {
        let cli = Cli::try_parse_from(["guesspipe"]).unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(cli.resolved_command(), Command::Local(_)));
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn test_generator_args() {
        let cli = Cli::try_parse_from([
            "guesspipe",
            "generator",
            "--connect",
            "10.0.0.2:9000",
            "--corpus",
            "train.txt",
            "--budget",
            "500",
            "--flush-threshold",
            "100",
            "--connect-attempts",
            "3",
        ])
        .unwrap();

        let Some(Command::Generator(args)) = cli.command else {
            panic!("expected generator subcommand");
        };
        assert_eq!(args.connect, "10.0.0.2:9000");
        assert_eq!(args.corpus, PathBuf::from("train.txt"));

        let config = args.thresholds.generator_config();
        assert_eq!(config.generation_budget, 500);
        assert_eq!(config.flush_threshold, 100);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);

        let connect = args.connect_config(1024);
        assert_eq!(connect.attempts, 3);
        assert_eq!(connect.retry_delay, Duration::from_millis(200));
        assert_eq!(connect.max_frame_bytes, 1024);
    }

    #[test]
    fn test_verifier_requires_oracle() {
        assert!(Cli::try_parse_from(["guesspipe", "verifier"]).is_err());

        let cli = Cli::try_parse_from([
            "guesspipe",
            "verifier",
            "--oracle",
            "leak.txt",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Some(Command::Verifier(args)) = cli.command else {
            panic!("expected verifier subcommand");
        };
        assert_eq!(args.oracle_limit, DEFAULT_ORACLE_LIMIT);
        assert_eq!(args.digest, DigestKind::Md5);
    }

    #[test]
    fn test_digest_and_metrics_out() {
        let cli = Cli::try_parse_from([
            "guesspipe",
            "verifier",
            "--oracle",
            "leak.txt",
            "--digest",
            "sha256",
            "--metrics-out",
            "run.txt",
        ])
        .unwrap();
        assert_eq!(cli.metrics_out, Some(PathBuf::from("run.txt")));
        let Some(Command::Verifier(args)) = cli.command else {
            panic!("expected verifier subcommand");
        };
        assert_eq!(args.digest, DigestKind::Sha256);

        assert!(Cli::try_parse_from(["guesspipe", "local", "--digest", "sha1"]).is_err());
    }

    #[test]
    fn test_local_resolve_defaults() {
        let args = LocalArgs {
            seed: Some(7),
            sample_dir: Some(PathBuf::from("/tmp/samples")),
            ..LocalArgs::default()
        };
        let config = args.resolve();

        assert_eq!(config.seed, 7);
        assert!(config.generate_corpus);
        assert!(config.generate_oracle);
        assert_eq!(config.corpus, PathBuf::from("/tmp/samples/guesspipe-7-train.txt"));
        assert_eq!(config.oracle, PathBuf::from("/tmp/samples/guesspipe-7-leak.txt"));
        assert_eq!(config.sample_lines, DEFAULT_SAMPLE_LINES);
        assert_eq!(config.capacity, DEFAULT_LOCAL_CAPACITY);
        assert_eq!(config.digest, DigestKind::Md5);
        assert_eq!(config.generator, GeneratorConfig::default());
    }

    #[test]
    fn test_local_resolve_explicit_paths() {
        let cli = Cli::try_parse_from([
            "guesspipe",
            "local",
            "--corpus",
            "train.txt",
            "--oracle",
            "leak.txt",
            "--progress-interval",
            "10",
        ])
        .unwrap();
        let Command::Local(args) = cli.resolved_command() else {
            panic!("expected local subcommand");
        };
        let config = args.resolve();

        assert!(!config.generate_corpus);
        assert!(!config.generate_oracle);
        assert_eq!(config.corpus, PathBuf::from("train.txt"));
        assert_eq!(config.generator.progress_interval, 10);
    }
}
