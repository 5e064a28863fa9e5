//! Integration tests for the full guess pipeline.
//!
//! These run both roles on separate threads connected by a real transport
//! (in-process queues or loopback TCP) and check the cross-role properties:
//! batches arrive intact and in order, the verifier drains everything before
//! exiting, and timing converges once both roles report their end stamps.

use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

use guesspipe_core::{
    framing::DEFAULT_MAX_FRAME_BYTES,
    transport::ConnectConfig,
    ControlChannel, ControlMessage, Generator, GeneratorConfig, GuessBatch, LocalTransport,
    ScriptedModel, StopReason, TcpTransport, Timestamp, VerificationOracle, Verifier,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn leaked_oracle() -> VerificationOracle {
    ["password", "letmein", "123456"].into_iter().collect()
}

/// Flush after every pop that produced anything.
fn flush_every_pop() -> GeneratorConfig {
    GeneratorConfig {
        flush_threshold: 0,
        progress_interval: 1,
        generation_budget: usize::MAX,
    }
}

/// The canonical scenario: two batches, three of five guesses are known.
#[test]
fn test_end_to_end_scenario() {
    let (gen_side, ver_side) = LocalTransport::pair(32);

    let verifier = thread::spawn(move || {
        let mut channel = ControlChannel::new(ver_side);
        Verifier::new(leaked_oracle()).run(&mut channel).unwrap()
    });

    let model = ScriptedModel::new([
        vec!["password", "qwerty"],
        vec!["letmein", "123456", "zzz"],
    ]);
    let mut generator = Generator::new(model, flush_every_pop());
    let mut channel = ControlChannel::new(gen_side);
    let gen_metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

    let ver_metrics = verifier.join().unwrap();

    assert_eq!(ver_metrics.cracked, 3);
    assert_eq!(ver_metrics.batches_received, 2);
    assert_eq!(ver_metrics.guesses_checked, 5);
    assert!(ver_metrics.hash_time > Duration::ZERO);

    assert_eq!(gen_metrics.batches_sent, 2);
    assert_eq!(gen_metrics.stop_reason, StopReason::Exhausted);
    assert_eq!(Some(gen_metrics.verifier_end), ver_metrics.verifier_end);
    assert!(gen_metrics.verifier_end >= gen_metrics.run_start);
    assert_eq!(
        gen_metrics.total_elapsed,
        gen_metrics
            .generator_end
            .max(gen_metrics.verifier_end)
            .saturating_since(gen_metrics.run_start)
    );
}

/// 1,000,001 guesses in one pop cross the strict threshold and go out as a
/// single batch before anything else is sent.
#[test]
fn test_flow_control_threshold_boundary() {
    let (gen_side, peer_side) = LocalTransport::pair(32);

    let generator = thread::spawn(move || {
        let big: Vec<String> = (0..1_000_001).map(|i| i.to_string()).collect();
        let model = ScriptedModel::new([big, vec!["tail".to_string()]]);
        let mut generator = Generator::new(model, GeneratorConfig::default());
        let mut channel = ControlChannel::new(gen_side);
        generator.run(Path::new("scripted"), &mut channel).unwrap()
    });

    let mut peer = ControlChannel::new(peer_side);
    let mut sizes = Vec::new();
    loop {
        match peer.receive().unwrap() {
            ControlMessage::Batch(batch) => {
                if sizes.is_empty() {
                    assert_eq!(batch.first().map(Vec::as_slice), Some(&b"0"[..]));
                    assert_eq!(batch.last().map(Vec::as_slice), Some(&b"1000000"[..]));
                }
                sizes.push(batch.len());
            }
            ControlMessage::Continuation(flag) => {
                assert!(!flag);
                break;
            }
        }
    }
    peer.send_timestamp(Timestamp::now()).unwrap();

    let metrics = generator.join().unwrap();
    assert_eq!(sizes, vec![1_000_001, 1]);
    assert_eq!(metrics.guesses_generated, 1_000_002);
}

/// A tiny queue forces the generator to block on a slow verifier; every
/// batch still has to be counted before the verifier exits.
#[test]
fn test_drain_before_exit_under_backpressure() {
    const BATCHES: usize = 200;
    let (gen_side, ver_side) = LocalTransport::pair(2);

    let verifier = thread::spawn(move || {
        let mut channel = ControlChannel::new(ver_side);
        let mut verifier = Verifier::new(leaked_oracle());
        // Let the generator fill the queue and finish sending first.
        thread::sleep(Duration::from_millis(20));
        verifier.run(&mut channel).unwrap()
    });

    let groups = (0..BATCHES).map(|i| vec!["password".to_string(), format!("miss{i}")]);
    let mut generator = Generator::new(ScriptedModel::new(groups), flush_every_pop());
    let mut channel = ControlChannel::new(gen_side);
    let gen_metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

    let ver_metrics = verifier.join().unwrap();
    assert_eq!(gen_metrics.batches_sent, BATCHES as u64);
    assert_eq!(ver_metrics.batches_received, BATCHES as u64);
    assert_eq!(ver_metrics.cracked, BATCHES as u64);
    assert_eq!(ver_metrics.guesses_checked, 2 * BATCHES as u64);
}

/// A model that runs dry below the budget stops on the exhaustion path.
#[test]
fn test_termination_by_exhaustion() {
    let (gen_side, ver_side) = LocalTransport::pair(32);

    let verifier = thread::spawn(move || {
        let mut channel = ControlChannel::new(ver_side);
        Verifier::new(leaked_oracle()).run(&mut channel).unwrap()
    });

    let groups = (0..25).map(|g| {
        (0..10_000)
            .map(move |i| format!("{g}-{i}"))
            .collect::<Vec<_>>()
    });
    let mut generator = Generator::new(ScriptedModel::new(groups), GeneratorConfig::default());
    let mut channel = ControlChannel::new(gen_side);
    let gen_metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

    let ver_metrics = verifier.join().unwrap();
    assert_eq!(gen_metrics.stop_reason, StopReason::Exhausted);
    assert_eq!(gen_metrics.pops, 25);
    assert_eq!(gen_metrics.guesses_generated, 250_000);
    assert_eq!(ver_metrics.guesses_checked, 250_000);
    assert_eq!(ver_metrics.cracked, 0);
}

/// A budget below the model's output stops on the budget path.
#[test]
fn test_termination_by_budget() {
    let (gen_side, ver_side) = LocalTransport::pair(32);

    let verifier = thread::spawn(move || {
        let mut channel = ControlChannel::new(ver_side);
        Verifier::new(leaked_oracle()).run(&mut channel).unwrap()
    });

    let config = GeneratorConfig {
        flush_threshold: 1_000,
        progress_interval: 100,
        generation_budget: 1_000,
    };
    let groups = (0..100).map(|g| (0..50).map(move |i| format!("{g}:{i}")).collect::<Vec<_>>());
    let mut generator = Generator::new(ScriptedModel::new(groups), config);
    let mut channel = ControlChannel::new(gen_side);
    let gen_metrics = generator.run(Path::new("scripted"), &mut channel).unwrap();

    let ver_metrics = verifier.join().unwrap();
    assert_eq!(gen_metrics.stop_reason, StopReason::Budget);
    // Budget is checked at progress marks: 1000 is not > 1000, 1100 is
    assert_eq!(gen_metrics.guesses_generated, 1_100);
    assert_eq!(ver_metrics.guesses_checked, 1_100);
}

/// Both roles over loopback TCP, as they run in separate processes.
#[test]
fn test_end_to_end_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let verifier = thread::spawn(move || {
        let transport = TcpTransport::accept(&listener, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let mut channel = ControlChannel::new(transport);
        Verifier::new(leaked_oracle()).run(&mut channel).unwrap()
    });

    let transport = TcpTransport::connect(&addr, ConnectConfig::default()).unwrap();
    let mut channel = ControlChannel::new(transport);
    let model = ScriptedModel::new([
        vec!["password", "qwerty"],
        vec!["letmein", "123456", "zzz"],
    ]);
    let gen_metrics = Generator::new(model, flush_every_pop())
        .run(Path::new("scripted"), &mut channel)
        .unwrap();

    let ver_metrics = verifier.join().unwrap();
    assert_eq!(ver_metrics.cracked, 3);
    assert_eq!(Some(gen_metrics.verifier_end), ver_metrics.verifier_end);
    // 2 batches * 4 operations + 2 for the stop signal
    assert_eq!(gen_metrics.transport.frames_sent, 10);
}

/// A Latin-1 password in the leak is cracked by the identical bytes and
/// only by them.
#[test]
fn test_non_utf8_guess_cracked_end_to_end() {
    let (gen_side, ver_side) = LocalTransport::pair(32);

    let verifier = thread::spawn(move || {
        let oracle: VerificationOracle = [b"\xe9t\xe9".to_vec(), b"caf\xe9".to_vec()]
            .into_iter()
            .collect();
        let mut channel = ControlChannel::new(ver_side);
        Verifier::new(oracle).run(&mut channel).unwrap()
    });

    let model = ScriptedModel::new([
        vec![b"\xe8t\xe8".to_vec(), b"\xe9t\xe9".to_vec()],
        vec![b"caf\xc3\xa9".to_vec(), b"caf\xe9".to_vec()],
    ]);
    let mut generator = Generator::new(model, flush_every_pop());
    let mut channel = ControlChannel::new(gen_side);
    generator.run(Path::new("scripted"), &mut channel).unwrap();

    let ver_metrics = verifier.join().unwrap();
    assert_eq!(ver_metrics.guesses_checked, 4);
    assert_eq!(ver_metrics.cracked, 2);
}

/// Seeded random batches of arbitrary bytes, including empty items and
/// sequences that are not valid UTF-8, arrive byte-for-byte over TCP.
#[test]
fn test_random_batches_over_tcp() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let batches: Vec<GuessBatch> = (0..20)
        .map(|_| {
            let items = rng.gen_range(0..50);
            (0..items)
                .map(|_| {
                    let len = rng.gen_range(0..12);
                    (0..len).map(|_| rng.gen::<u8>()).collect()
                })
                .collect()
        })
        .collect();
    assert!(batches
        .iter()
        .flatten()
        .any(|item| std::str::from_utf8(item).is_err()));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let expected = batches.clone();
    let receiver = thread::spawn(move || {
        let transport = TcpTransport::accept(&listener, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let mut channel = ControlChannel::new(transport);
        let mut received = Vec::new();
        while let ControlMessage::Batch(batch) = channel.receive().unwrap() {
            received.push(batch);
        }
        received
    });

    let transport = TcpTransport::connect(&addr, ConnectConfig::default()).unwrap();
    let mut channel = ControlChannel::new(transport);
    for batch in &batches {
        channel.send_batch(batch).unwrap();
    }
    channel.send(&ControlMessage::STOP).unwrap();

    assert_eq!(receiver.join().unwrap(), expected);
}
