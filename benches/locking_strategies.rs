//! Benchmark suite for comparing locking strategies
//!
//! This benchmark compares the throughput of every locking strategy using the
//! divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Workloads
//!
//! - `uncontended` - single-threaded deposit/withdraw/transfer sweep
//! - `small_stress` - full conservation run, 10 accounts (high contention)
//! - `large_stress` - full conservation run, 1,000 accounts (low contention)

use concurrent_ledger::harness::{run_stress, StressConfig};
use concurrent_ledger::strategy::{create_ledger, StrategyType};
use std::time::Duration;

fn main() {
    divan::main();
}

fn stress_config(num_accounts: usize, repeats: usize) -> StressConfig {
    StressConfig::new(num_accounts, 1000, repeats, 2, Duration::from_secs(60))
        .expect("Invalid benchmark config")
}

/// Benchmark one thread sweeping 100 accounts with every operation kind
#[divan::bench(args = StrategyType::ALL)]
fn uncontended(bencher: divan::Bencher, strategy: StrategyType) {
    let config = stress_config(100, 1);
    let ledger = create_ledger(strategy, &config.ledger_config());

    bencher.bench_local(|| {
        for id in 1..=100u64 {
            let _ = ledger.deposit(id, id as i64);
            let _ = ledger.withdraw(id, id as i64);
            let _ = ledger.transfer(id, 101 - id, id as i64);
        }
    });
}

/// Benchmark a conservation run on 10 accounts (6 threads, 6,000 operations)
#[divan::bench(args = StrategyType::ALL)]
fn small_stress(strategy: StrategyType) {
    run_stress(strategy, &stress_config(10, 100)).expect("Stress run failed");
}

/// Benchmark a conservation run on 1,000 accounts (6 threads, 60,000 operations)
#[divan::bench(args = StrategyType::ALL, sample_count = 20)]
fn large_stress(strategy: StrategyType) {
    run_stress(strategy, &stress_config(1000, 10)).expect("Stress run failed");
}
