// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! drpc-bench - RPC round-trip benchmark tool
//!
//! Publishes calculator instances on an in-memory broker and measures
//! single-call latency or distributed-call fan-in.

use clap::{Parser, Subcommand};
use colored::*;
use drpc::{Client, CodecKind, InvocationError, MemoryBroker, Registration, RpcConfig};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

drpc::service! {
    pub trait Calculator {
        contract = CalculatorContract;
        client = CalculatorClient;
        service = CalculatorService;

        fn add(a: i32, b: i32) -> i32;
    }
}

struct Adder;

impl Calculator for Adder {
    fn add(&self, a: i32, b: i32) -> Result<i32, InvocationError> {
        Ok(a.wrapping_add(b))
    }
}

/// drpc round-trip benchmark
#[derive(Parser, Debug)]
#[command(name = "drpc-bench")]
#[command(version = "0.1.0")]
#[command(about = "Measure drpc call latency over the in-memory broker")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Value codec: json, cdr
    #[arg(short, long, default_value = "json", global = true)]
    codec: CodecArg,

    /// Worker threads per client
    #[arg(short, long, default_value = "4", global = true)]
    workers: usize,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Blocking single calls to one instance
    Call {
        /// Number of calls
        #[arg(short = 'n', long, default_value = "1000")]
        count: u64,

        /// Warmup calls before measurement
        #[arg(long, default_value = "10")]
        warmup: u64,

        /// Quiet mode - only output final results
        #[arg(long)]
        quiet: bool,
    },
    /// Distributed calls answered by every instance
    Drpc {
        /// Number of distributed calls
        #[arg(short = 'n', long, default_value = "100")]
        count: u64,

        /// Published instances answering each call
        #[arg(short, long, default_value = "3")]
        instances: usize,

        /// Time to wait for all responses of one call (ms)
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },
}

#[derive(Clone, Copy, Debug)]
struct CodecArg(CodecKind);

impl std::str::FromStr for CodecArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self(CodecKind::Json)),
            "cdr" => Ok(Self(CodecKind::Cdr)),
            _ => Err(format!("Unknown codec: {}", s)),
        }
    }
}

fn main() {
    // Initialize logger for RUST_LOG-based debug output
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = RpcConfig {
        codec: args.codec.0,
        worker_threads: args.workers,
        call_timeout_ms: 5_000,
        ..RpcConfig::default()
    };
    let broker = MemoryBroker::new();

    match &args.mode {
        Mode::Call {
            count,
            warmup,
            quiet,
        } => run_calls(&broker, &config, *count, *warmup, *quiet),
        Mode::Drpc {
            count,
            instances,
            timeout_ms,
        } => run_drpc(
            &broker,
            &config,
            *count,
            *instances,
            Duration::from_millis(*timeout_ms),
        ),
    }
}

fn build(broker: &MemoryBroker, config: &RpcConfig) -> Result<Client, drpc::RpcError> {
    Client::builder()
        .config(config.clone())
        .build(broker.transport())
}

fn run_calls(
    broker: &MemoryBroker,
    config: &RpcConfig,
    count: u64,
    warmup: u64,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = build(broker, config)?;
    let _service = server.publish::<CalculatorContract, _>("bench", CalculatorService(Adder))?;
    let caller = build(broker, config)?;
    let calc = caller.connector::<CalculatorContract>().connect(Some("bench"));

    if !quiet {
        eprintln!("{} drpc single calls", ">>>".green().bold());
        eprintln!(
            "    codec={:?}, workers={}, count={}, warmup={}",
            config.codec, config.worker_threads, count, warmup
        );
    }

    for _ in 0..warmup {
        calc.add(1, 1)?;
    }

    let mut latencies: Vec<f64> = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    let mut failed = 0u64;
    let start_time = Instant::now();

    for i in 0..count {
        let a = fastrand::i32(..);
        let b = fastrand::i32(..);

        let sent = Instant::now();
        match calc.add(a, b) {
            Ok(sum) if sum == a.wrapping_add(b) => {
                latencies.push(sent.elapsed().as_secs_f64() * 1_000_000.0);
            }
            Ok(sum) => {
                log::warn!("wrong sum {} for {} + {}", sum, a, b);
                failed += 1;
            }
            Err(e) => {
                log::warn!("call failed: {}", e);
                failed += 1;
            }
        }

        let done = i + 1;
        if !quiet && (done % 100 == 0 || done == count) {
            eprint!("\r    Progress: {}/{}", done, count);
            let _ = io::stderr().flush();
        }
    }
    if !quiet {
        eprintln!();
    }

    let stats = calculate_stats(&latencies);
    print_results(&stats, failed, start_time.elapsed(), quiet);

    caller.close()?;
    server.close()?;
    Ok(())
}

fn run_drpc(
    broker: &MemoryBroker,
    config: &RpcConfig,
    count: u64,
    instances: usize,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let servers = (0..instances)
        .map(|_| build(broker, config))
        .collect::<Result<Vec<_>, _>>()?;
    let _services = servers
        .iter()
        .enumerate()
        .map(|(i, server)| {
            server.publish::<CalculatorContract, _>(&format!("node-{}", i), CalculatorService(Adder))
        })
        .collect::<Result<Vec<Registration>, _>>()?;
    let caller = build(broker, config)?;
    let connector = caller.connector::<CalculatorContract>();

    eprintln!("{} drpc distributed calls", ">>>".green().bold());
    eprintln!(
        "    codec={:?}, instances={}, count={}",
        config.codec, instances, count
    );

    let expected = instances as u64;
    let mut latencies: Vec<f64> = Vec::new();
    let mut incomplete = 0u64;

    for _ in 0..count {
        let received = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&received);
        let sent = Instant::now();
        let stream = connector.drpc(
            |calc| calc.add(2, 3),
            move |_sum: i32| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        )?;

        let deadline = sent + timeout;
        while received.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            std::thread::sleep(Duration::from_micros(20));
        }
        stream.close();

        if received.load(Ordering::SeqCst) >= expected {
            latencies.push(sent.elapsed().as_secs_f64() * 1_000_000.0);
        } else {
            incomplete += 1;
        }
    }

    let stats = calculate_stats(&latencies);
    println!();
    println!("{}", "=== drpc Fan-in Results ===".bold());
    println!("  {} {}", "Complete calls:".cyan(), stats.count);
    println!("  {} {}", "Incomplete calls:".cyan(), incomplete);
    println!("  {} {:>10.2} us", "Mean (all answers):".yellow(), stats.mean);
    println!("  {} {:>10.2} us", "p99:".white(), stats.p99);

    caller.close()?;
    for server in &servers {
        server.close()?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Stats {
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    p50: f64,
    p99: f64,
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn calculate_stats(latencies: &[f64]) -> Stats {
    if latencies.is_empty() {
        return Stats::default();
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let percentile = |p: f64| -> f64 {
        let idx = ((p / 100.0) * (n - 1) as f64).round() as usize;
        sorted[idx.min(n - 1)]
    };

    Stats {
        count: n,
        min: sorted[0],
        max: sorted[n - 1],
        mean: latencies.iter().sum::<f64>() / n as f64,
        p50: percentile(50.0),
        p99: percentile(99.0),
    }
}

fn print_results(stats: &Stats, failed: u64, total_time: Duration, quiet: bool) {
    if quiet {
        println!(
            "min={:.1} max={:.1} avg={:.1} p99={:.1} us",
            stats.min, stats.max, stats.mean, stats.p99
        );
        return;
    }

    println!();
    println!("{}", "=== drpc Call Results ===".bold());
    println!();
    println!("  {} {}", "Calls:".cyan(), stats.count);
    println!("  {} {}", "Failed:".cyan(), failed);
    println!("  {} {:.2}s", "Duration:".cyan(), total_time.as_secs_f64());
    println!();
    println!("{}", "--- Latency (microseconds) ---".dimmed());
    println!("  {} {:>10.2} us", "Min:".green(), stats.min);
    println!("  {} {:>10.2} us", "Max:".red(), stats.max);
    println!("  {} {:>10.2} us", "Mean:".yellow(), stats.mean);
    println!("  {} {:>10.2} us", "p50:".white(), stats.p50);
    println!("  {} {:>10.2} us", "p99:".white(), stats.p99);
    println!();
}
