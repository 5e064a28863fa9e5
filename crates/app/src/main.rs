//! guesspipe: distributed password-guess generation and verification.
//!
//! Run the two roles as separate processes:
//!
//! ```text
//! guesspipe verifier --listen 0.0.0.0:7878 --oracle leak.txt
//! guesspipe generator --connect verifier-host:7878 --corpus train.txt
//! ```
//!
//! or both at once in-process with `guesspipe local` (the default).

mod config;
mod input_gen;
mod pcfg;

use std::net::TcpListener;
use std::path::Path;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use guesspipe_core::{
    ControlChannel, Generator, GeneratorMetrics, LocalTransport, Sha256Lanes, TcpTransport,
    Transport, VerificationOracle, Verifier, VerifierMetrics,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{
    time_seed, Cli, Command, DigestKind, GeneratorArgs, LocalArgs, SampleCorpusArgs,
    VerifierArgs,
};
use pcfg::PcfgModel;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let command = cli.resolved_command();
    if cli.print_config {
        cli.print(&command);
    }

    match command {
        Command::Verifier(args) => run_verifier(&cli, &args),
        Command::Generator(args) => run_generator(&cli, &args),
        Command::Local(args) => run_local(&cli, &args),
        Command::SampleCorpus(args) => run_sample_corpus(&args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level {level:?}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

fn run_verifier(cli: &Cli, args: &VerifierArgs) -> Result<()> {
    let oracle = VerificationOracle::load(&args.oracle, args.oracle_limit)?;

    let listener = TcpListener::bind(&args.listen)
        .with_context(|| format!("binding verifier endpoint {}", args.listen))?;
    info!(addr = %args.listen, known = oracle.len(), "verifier listening");

    let transport = TcpTransport::accept(&listener, cli.max_frame_bytes)?;
    info!(peer = %transport.peer_addr(), "generator connected");

    let mut channel = ControlChannel::new(transport);
    let metrics = verify(oracle, args.digest, &mut channel)?;

    if !cli.no_metrics {
        metrics.print_summary();
    }
    write_metrics(cli.metrics_out.as_deref(), &[("verifier", metrics.export_text())])
}

fn run_generator(cli: &Cli, args: &GeneratorArgs) -> Result<()> {
    let config = args.thresholds.generator_config();
    config.validate()?;

    let transport = TcpTransport::connect(&args.connect, args.connect_config(cli.max_frame_bytes))?;
    info!(peer = %transport.peer_addr(), "connected to verifier");

    let mut channel = ControlChannel::new(transport);
    let mut generator = Generator::new(PcfgModel::new(), config);
    let metrics = generator.run(&args.corpus, &mut channel)?;
    log_grammar(generator.model());

    if !cli.no_metrics {
        metrics.print_summary();
    }
    write_metrics(cli.metrics_out.as_deref(), &[("generator", metrics.export_text())])
}

/// Both roles in one process: the verifier on its own thread, the generator
/// on this one, joined by a bounded in-memory transport.
fn run_local(cli: &Cli, args: &LocalArgs) -> Result<()> {
    let config = args.resolve();
    if cli.print_config {
        config.print();
    }
    config.generator.validate()?;

    if config.generate_corpus {
        input_gen::write_sample_corpus(&config.corpus, config.seed, config.sample_lines)
            .with_context(|| format!("writing sample corpus {}", config.corpus.display()))?;
        info!(
            path = %config.corpus.display(),
            lines = config.sample_lines,
            "generated training corpus"
        );
    }
    if config.generate_oracle {
        // A second draw from the same vocabulary stands in for the leak
        let leak_seed = config.seed.wrapping_add(1);
        input_gen::write_sample_corpus(&config.oracle, leak_seed, config.sample_lines)
            .with_context(|| format!("writing sample oracle {}", config.oracle.display()))?;
        info!(path = %config.oracle.display(), lines = config.sample_lines, "generated oracle");
    }

    let oracle = VerificationOracle::load(&config.oracle, config.oracle_limit)?;
    let (gen_side, ver_side) = LocalTransport::pair(config.capacity);
    let digest = config.digest;

    let verifier = thread::Builder::new()
        .name("verifier".into())
        .spawn(move || {
            let mut channel = ControlChannel::new(ver_side);
            verify(oracle, digest, &mut channel)
        })
        .context("spawning verifier thread")?;

    let mut channel = ControlChannel::new(gen_side);
    let mut generator = Generator::new(PcfgModel::new(), config.generator);
    let generated = generator.run(&config.corpus, &mut channel);
    log_grammar(generator.model());
    // Unblocks the verifier if the generator failed before sending the stop
    drop(channel);

    let verified = verifier
        .join()
        .map_err(|_| anyhow!("verifier thread panicked"))?;

    let gen_metrics = generated?;
    let ver_metrics = verified?;

    if !cli.no_metrics {
        print_local_summary(&gen_metrics, &ver_metrics);
    }
    write_metrics(
        cli.metrics_out.as_deref(),
        &[
            ("generator", gen_metrics.export_text()),
            ("verifier", ver_metrics.export_text()),
        ],
    )
}

fn verify<T: Transport>(
    oracle: VerificationOracle,
    digest: DigestKind,
    channel: &mut ControlChannel<T>,
) -> guesspipe_core::Result<VerifierMetrics> {
    match digest {
        DigestKind::Md5 => Verifier::new(oracle).run(channel),
        DigestKind::Sha256 => Verifier::with_digest(oracle, Sha256Lanes).run(channel),
    }
}

/// One `[role]` section per exported report.
fn metrics_report(sections: &[(&str, String)]) -> String {
    sections
        .iter()
        .map(|(role, body)| format!("[{role}]\n{body}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_metrics(path: Option<&Path>, sections: &[(&str, String)]) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    std::fs::write(path, metrics_report(sections))
        .with_context(|| format!("writing metrics to {}", path.display()))?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}

fn log_grammar(model: &PcfgModel) {
    info!(
        passwords = model.passwords_trained(),
        structures = model.structure_count(),
        "grammar used"
    );
}

fn print_local_summary(generator: &GeneratorMetrics, verifier: &VerifierMetrics) {
    generator.print_summary();
    verifier.print_summary();
    println!("=== Run ===");
    println!("Train time: {:.6} seconds", generator.train_time.as_secs_f64());
    println!("Guess time: {:.6} seconds", generator.guess_time.as_secs_f64());
    println!("Hash time: {:.6} seconds", verifier.hash_time.as_secs_f64());
    println!("Cracked: {}", verifier.cracked);
    println!("Total time: {:.6} seconds", generator.total_elapsed.as_secs_f64());
    println!();
}

fn run_sample_corpus(args: &SampleCorpusArgs) -> Result<()> {
    let seed = args.seed.unwrap_or_else(time_seed);
    input_gen::write_sample_corpus(&args.out, seed, args.lines)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(path = %args.out.display(), seed, lines = args.lines, "sample corpus written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_report_sections() {
        let verifier = VerifierMetrics {
            cracked: 3,
            ..VerifierMetrics::default()
        };
        let report = metrics_report(&[
            ("generator", "guesses_generated=5\n".to_string()),
            ("verifier", verifier.export_text()),
        ]);

        assert!(report.starts_with("[generator]\nguesses_generated=5\n"));
        assert!(report.contains("\n[verifier]\nhash_secs="));
        assert!(report.contains("cracked=3\n"));
    }

    #[test]
    fn test_write_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.txt");

        write_metrics(None, &[("verifier", "x=1\n".to_string())]).unwrap();
        assert!(!path.exists());

        write_metrics(Some(&path), &[("verifier", "x=1\n".to_string())]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[verifier]\nx=1\n");
    }

    #[test]
    fn test_verify_with_either_digest() {
        for digest in [DigestKind::Md5, DigestKind::Sha256] {
            let (gen_side, ver_side) = LocalTransport::pair(16);
            let mut sender = ControlChannel::new(gen_side);
            sender.send_batch(&["password", "nope"]).unwrap();
            sender.send_continuation(false).unwrap();

            let oracle: VerificationOracle = ["password"].into_iter().collect();
            let mut channel = ControlChannel::new(ver_side);
            let metrics = verify(oracle, digest, &mut channel).unwrap();
            assert_eq!(metrics.cracked, 1);
            assert_eq!(metrics.lanes, 1);
        }
    }
}
