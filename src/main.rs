//! Entry point: parses the CLI, checks startup privilege, and either runs
//! the watchdog loop or prints a one-shot status report.
//!
//! Grounded on the teacher's own `main.rs`: a `clap` derive `Cli`, a
//! `tracing_subscriber::fmt` subscriber set up before anything else runs,
//! and a `match` over the subcommand enum.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use memory_leak_killer::config::{Cli, Command, Config};
use memory_leak_killer::{oracle::MemoryOracle, privilege, sampler::Sampler, Scheduler};

const EXIT_OK: i32 = 0;
const EXIT_INSUFFICIENT_PRIVILEGE: i32 = 2;
const EXIT_INVALID_FLAGS: i32 = 3;

/// `status` has no running tick interval of its own; use the scheduler's
/// default so the sampler's soft deadline still applies to a one-shot scan.
const DEFAULT_RUN_INTERVAL_S: u64 = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Run(args) => run(args),
        Command::Status => status(),
    };

    std::process::exit(exit_code);
}

fn run(args: memory_leak_killer::config::RunArgs) -> i32 {
    if let Err(e) = privilege::check() {
        eprintln!("{e}");
        return EXIT_INSUFFICIENT_PRIVILEGE;
    }
    privilege::protect_from_oom_killer();

    let config = match Config::from_args(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_INVALID_FLAGS;
        }
    };

    let mut scheduler = match Scheduler::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to start: {e}");
            return EXIT_INVALID_FLAGS;
        }
    };

    match scheduler.run() {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("watchdog exited with an error: {e}");
            EXIT_INVALID_FLAGS
        }
    }
}

fn status() -> i32 {
    let oracle = MemoryOracle::new();
    let mem = match oracle.read() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("failed to read system memory: {e}");
            return EXIT_INVALID_FLAGS;
        }
    };

    println!(
        "memory: {:.0} MB total, {:.1}% used",
        mem.total_mb(),
        mem.used_pct()
    );

    let mut sampler = Sampler::new();
    let mut processes = sampler.snapshot(DEFAULT_RUN_INTERVAL_S);
    processes.sort_by_key(|p| std::cmp::Reverse(p.rss_bytes));

    println!("top processes by RSS:");
    for p in processes.iter().take(10) {
        println!(
            "  pid={:<8} rss={:>8.1} MB  {}",
            p.pid,
            p.rss_bytes as f64 / (1024.0 * 1024.0),
            p.basename
        );
    }

    EXIT_OK
}
