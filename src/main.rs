//! Concurrent Ledger stress CLI
//!
//! Runs the conservation stress test against one or all locking strategies and
//! writes one CSV report row per strategy to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release
//! cargo run --release -- --strategy pooled --accounts 1000 --threads-per-op 8
//! cargo run --release -- --repeats 100 --balances target/balances > report.csv
//! RUST_LOG=debug cargo run -- --strategy hybrid
//! ```
//!
//! Logs go to stderr so stdout stays pure CSV.
//!
//! # Exit Codes
//!
//! - 0: Every selected strategy conserved the ledger total
//! - 1: Invalid configuration, conservation violation, worker panic, stall or
//!   I/O error

use concurrent_ledger::cli;
use concurrent_ledger::harness::{run_strategies, write_reports_csv};
use concurrent_ledger::types::HarnessError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        tracing::error!(error = %e, "stress run failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> Result<(), HarnessError> {
    let config = args.to_stress_config()?;
    let reports = run_strategies(
        &args.strategy.strategies(),
        &config,
        args.balances.as_deref(),
    )?;

    let mut output = std::io::stdout();
    write_reports_csv(&reports, &mut output)
}
