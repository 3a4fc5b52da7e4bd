//! Concurrent stress harness
//!
//! This module drives a shared ledger from many threads and checks the
//! results:
//!
//! - [`check_conservation`] runs deposit, withdrawal and transfer workers,
//!   tallies every successful operation, and asserts after all workers joined
//!   that `initial + deposited - withdrawn == ledger.total()`.
//! - [`run_opposing_transfers`] hammers one account pair with transfers in
//!   both directions for a fixed duration; a lock-ordering bug shows up as a
//!   stall.
//! - [`observe_transfers`] samples balances and totals while transfers are in
//!   flight and checks them against the strategy's documented
//!   [`TotalConsistency`].
//!
//! Rejections by the ledger's bound checks are expected and counted as failed
//! attempts. Conservation mismatches, inconsistent observations, panicking
//! workers and workers that do not finish before the stall timeout are fatal.
//!
//! # Architecture
//!
//! ```text
//! check_conservation
//!     ├── deposits-{i}     sweep: deposit(id, id)
//!     ├── withdrawals-{i}  sweep: withdraw(id, id)
//!     └── transfers-{i}    sweep: transfer(id, N + 1 - id, id)
//!             │
//!             └── completion channel ── recv_timeout(stall_timeout)
//! ```

use crate::core::{Ledger, TotalConsistency};
use crate::harness::config::StressConfig;
use crate::harness::report::write_balances_csv;
use crate::strategy::{create_ledger, StrategyType};
use crate::types::{within_bounds, AccountId, HarnessError, LedgerError, Money, MAX_BALANCE};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Kind of operation performed by a conservation worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl OperationKind {
    /// Every kind, one worker group each
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Deposit,
        OperationKind::Withdraw,
        OperationKind::Transfer,
    ];

    fn label(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposits",
            OperationKind::Withdraw => "withdrawals",
            OperationKind::Transfer => "transfers",
        }
    }

    /// Apply the operation for `id`, returning the amount moved on success
    ///
    /// The amount equals the account id; transfers pair account `id` with
    /// its mirror `num_accounts + 1 - id`.
    fn apply(
        &self,
        ledger: &dyn Ledger,
        id: AccountId,
        num_accounts: usize,
    ) -> Result<Money, LedgerError> {
        let amount = id as Money;
        match self {
            OperationKind::Deposit => ledger.deposit(id, amount)?,
            OperationKind::Withdraw => ledger.withdraw(id, amount)?,
            OperationKind::Transfer => {
                let mirror = num_accounts as AccountId + 1 - id;
                ledger.transfer(id, mirror, amount)?
            }
        }
        Ok(amount)
    }
}

/// Outcome counters of one worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Operations attempted
    pub attempted: u64,
    /// Operations that succeeded
    pub succeeded: u64,
    /// Operations rejected by a balance bound check
    pub rejected: u64,
    /// Sum of the amounts of successful operations
    pub amount: Money,
}

impl Tally {
    fn record(&mut self, outcome: Result<Money, LedgerError>) {
        self.attempted += 1;
        match outcome {
            Ok(amount) => {
                self.succeeded += 1;
                self.amount += amount;
            }
            Err(e) if e.is_rejection() => self.rejected += 1,
            Err(_) => {}
        }
    }

    fn merge(&mut self, other: Tally) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.rejected += other.rejected;
        self.amount += other.amount;
    }
}

/// Result of a successful conservation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    pub strategy: String,
    pub threads: usize,
    pub attempted: u64,
    pub successful_deposits: u64,
    pub successful_withdrawals: u64,
    pub successful_transfers: u64,
    pub deposited: Money,
    pub withdrawn: Money,
    pub transferred: Money,
    pub initial_total: Money,
    pub expected_total: Money,
    pub actual_total: Money,
    pub elapsed_ms: u64,
    pub ops_per_sec: f64,
    pub success_rate: f64,
}

impl StressReport {
    /// Number of operations that succeeded
    pub fn successful(&self) -> u64 {
        self.successful_deposits + self.successful_withdrawals + self.successful_transfers
    }
}

/// Result of an opposing-transfers run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpposingTransfersReport {
    /// Transfers that succeeded
    pub completed: u64,
    /// Transfers rejected by a bound check
    pub rejected: u64,
}

/// Result of a transfer observation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationReport {
    /// Guarantee the samples were checked against
    pub consistency: TotalConsistency,
    /// Number of observer samples taken while transfers were running
    pub samples: u64,
    /// Transfers that succeeded
    pub transfers: u64,
}

type Work<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Signals the harness when a worker exits, including by panic
struct CompletionSignal(Sender<()>);

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Decrements a shared counter when a worker exits, including by panic
struct RunningWorker(Arc<AtomicUsize>);

impl Drop for RunningWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

/// Spawn named workers and wait for all of them
///
/// Workers that have not all exited within `timeout` are reported as
/// `Stalled` and left running; a deadlocked thread cannot be reclaimed.
fn run_workers<T: Send + 'static>(
    strategy: &str,
    workers: Vec<(String, Work<T>)>,
    timeout: Duration,
) -> Result<Vec<T>, HarnessError> {
    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::with_capacity(workers.len());

    for (name, work) in workers {
        let signal = CompletionSignal(tx.clone());
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _signal = signal;
            work()
        })?;
        handles.push((name, handle));
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    for _ in 0..handles.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(strategy, ?timeout, "workers stalled");
                return Err(HarnessError::Stalled {
                    strategy: strategy.to_string(),
                    timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    handles
        .into_iter()
        .map(|(worker, handle)| {
            handle.join().map_err(|_| {
                tracing::error!(strategy, worker, "worker panicked");
                HarnessError::WorkerPanicked {
                    strategy: strategy.to_string(),
                    worker,
                }
            })
        })
        .collect()
}

/// Sweep all accounts `repeats` times with one kind of operation
fn sweep(ledger: &dyn Ledger, kind: OperationKind, num_accounts: usize, repeats: usize) -> Tally {
    let mut tally = Tally::default();
    for _ in 0..repeats {
        for id in 1..=num_accounts as AccountId {
            tally.record(kind.apply(ledger, id, num_accounts));
        }
    }
    tally
}

/// Build a ledger with the given strategy and run a conservation check on it
pub fn run_stress(
    strategy: StrategyType,
    config: &StressConfig,
) -> Result<StressReport, HarnessError> {
    let ledger = create_ledger(strategy, &config.ledger_config());
    check_conservation(ledger, config)
}

/// Run a conservation check for each strategy in turn
///
/// When `balances_dir` is given, the final balances of each run are written
/// to `<balances_dir>/<strategy>_balances.csv`. Stops at the first fatal
/// outcome.
pub fn run_strategies(
    strategies: &[StrategyType],
    config: &StressConfig,
    balances_dir: Option<&Path>,
) -> Result<Vec<StressReport>, HarnessError> {
    let mut reports = Vec::with_capacity(strategies.len());
    for &strategy in strategies {
        let ledger = create_ledger(strategy, &config.ledger_config());
        reports.push(check_conservation(Arc::clone(&ledger), config)?);

        if let Some(dir) = balances_dir {
            let path = dir.join(format!("{}_balances.csv", strategy));
            let mut file = File::create(&path)?;
            write_balances_csv(&ledger.accounts(), &mut file)?;
            tracing::debug!(%strategy, path = %path.display(), "wrote balances");
        }
    }
    Ok(reports)
}

/// Drive deposits, withdrawals and transfers concurrently and verify the
/// conservation law
///
/// The ledger must hold accounts `1..=config.num_accounts`.
///
/// # Errors
///
/// - `ConservationViolated` if the final total differs from
///   `initial + deposited - withdrawn`
/// - `WorkerPanicked` if any worker panicked
/// - `Stalled` if the workers did not finish within `config.stall_timeout`
pub fn check_conservation(
    ledger: Arc<dyn Ledger>,
    config: &StressConfig,
) -> Result<StressReport, HarnessError> {
    let strategy = ledger.name();
    let num_accounts = config.num_accounts;
    let repeats = config.repeats;
    let initial_total = ledger.total();

    tracing::info!(
        strategy,
        threads = config.worker_threads(),
        operations = config.total_operations(),
        "starting conservation run"
    );

    let mut workers: Vec<(String, Work<(OperationKind, Tally)>)> = Vec::new();
    for i in 0..config.threads_per_operation {
        for kind in OperationKind::ALL {
            let ledger = Arc::clone(&ledger);
            workers.push((
                format!("{}-{}", kind.label(), i),
                Box::new(move || (kind, sweep(ledger.as_ref(), kind, num_accounts, repeats))),
            ));
        }
    }

    let started = Instant::now();
    let results = run_workers(strategy, workers, config.stall_timeout)?;
    let elapsed = started.elapsed();

    let mut deposits = Tally::default();
    let mut withdrawals = Tally::default();
    let mut transfers = Tally::default();
    for (kind, tally) in results {
        match kind {
            OperationKind::Deposit => deposits.merge(tally),
            OperationKind::Withdraw => withdrawals.merge(tally),
            OperationKind::Transfer => transfers.merge(tally),
        }
    }

    let expected_total = initial_total + deposits.amount - withdrawals.amount;
    let actual_total = ledger.total();
    if expected_total != actual_total {
        tracing::error!(strategy, expected_total, actual_total, "thread-safety broken");
        return Err(HarnessError::ConservationViolated {
            strategy: strategy.to_string(),
            expected: expected_total,
            actual: actual_total,
        });
    }

    let attempted = deposits.attempted + withdrawals.attempted + transfers.attempted;
    let successful = deposits.succeeded + withdrawals.succeeded + transfers.succeeded;
    let seconds = elapsed.as_secs_f64();
    let report = StressReport {
        strategy: strategy.to_string(),
        threads: config.worker_threads(),
        attempted,
        successful_deposits: deposits.succeeded,
        successful_withdrawals: withdrawals.succeeded,
        successful_transfers: transfers.succeeded,
        deposited: deposits.amount,
        withdrawn: withdrawals.amount,
        transferred: transfers.amount,
        initial_total,
        expected_total,
        actual_total,
        elapsed_ms: elapsed.as_millis() as u64,
        ops_per_sec: if seconds > 0.0 {
            attempted as f64 / seconds
        } else {
            0.0
        },
        success_rate: if attempted > 0 {
            100.0 * successful as f64 / attempted as f64
        } else {
            0.0
        },
    };

    tracing::info!(
        strategy,
        elapsed_ms = report.elapsed_ms,
        ops_per_sec = report.ops_per_sec,
        success_rate = report.success_rate,
        "conservation run passed"
    );
    Ok(report)
}

/// Run transfers in both directions between one account pair
///
/// Even-numbered threads move money from `pair.0` to `pair.1`, odd-numbered
/// threads the other way, until `duration` has elapsed. With guards acquired
/// in argument order this is the classic deadlock; the run must finish and
/// leave the pair's combined balance unchanged.
pub fn run_opposing_transfers(
    ledger: Arc<dyn Ledger>,
    pair: (AccountId, AccountId),
    threads: usize,
    duration: Duration,
    stall_timeout: Duration,
) -> Result<OpposingTransfersReport, HarnessError> {
    let strategy = ledger.name();
    let (a, b) = pair;
    let initial_total = ledger.total();

    tracing::info!(strategy, a, b, threads, ?duration, "starting opposing transfers");

    let workers: Vec<(String, Work<Tally>)> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let work: Work<Tally> = Box::new(move || {
                let (src, dst, amount) = if t % 2 == 0 { (a, b, 3) } else { (b, a, 2) };
                let started = Instant::now();
                let mut tally = Tally::default();
                while started.elapsed() < duration {
                    tally.record(ledger.transfer(src, dst, amount).map(|_| amount));
                }
                tally
            });
            (format!("opposing-{}", t), work)
        })
        .collect();

    let results = run_workers(strategy, workers, duration + stall_timeout)?;
    let mut total = Tally::default();
    for tally in results {
        total.merge(tally);
    }

    let actual_total = ledger.total();
    if actual_total != initial_total {
        return Err(HarnessError::ConservationViolated {
            strategy: strategy.to_string(),
            expected: initial_total,
            actual: actual_total,
        });
    }

    Ok(OpposingTransfersReport {
        completed: total.succeeded,
        rejected: total.rejected,
    })
}

enum ObserverOutcome {
    Transfers(Tally),
    Samples(Result<u64, String>),
}

/// Sample the ledger while transfers run and check every sample
///
/// For a `Linearizable` total every sampled total must equal the initial
/// total, because transfers are zero-sum. For a `Weak` total every sampled
/// balance must lie within `[0, MAX_BALANCE]` and every sampled total within
/// `[0, accounts * MAX_BALANCE]`. In both cases the total after all
/// transfers finished must equal the initial total.
pub fn observe_transfers(
    ledger: Arc<dyn Ledger>,
    config: &StressConfig,
) -> Result<ObservationReport, HarnessError> {
    let strategy = ledger.name();
    let consistency = ledger.total_consistency();
    let initial_total = ledger.total();
    let ids = ledger.account_ids();
    let num_accounts = config.num_accounts;
    let repeats = config.repeats;
    let running = Arc::new(AtomicUsize::new(config.threads_per_operation));

    let mut workers: Vec<(String, Work<ObserverOutcome>)> = Vec::new();
    for i in 0..config.threads_per_operation {
        let ledger = Arc::clone(&ledger);
        let running = RunningWorker(Arc::clone(&running));
        workers.push((
            format!("transfers-{}", i),
            Box::new(move || {
                let _running = running;
                ObserverOutcome::Transfers(sweep(
                    ledger.as_ref(),
                    OperationKind::Transfer,
                    num_accounts,
                    repeats,
                ))
            }),
        ));
    }

    {
        let ledger = Arc::clone(&ledger);
        let running = Arc::clone(&running);
        let max_total = ids.len() as Money * MAX_BALANCE;
        workers.push((
            "observer".to_string(),
            Box::new(move || {
                let mut samples = 0u64;
                loop {
                    let total = ledger.total();
                    match consistency {
                        TotalConsistency::Linearizable if total != initial_total => {
                            return ObserverOutcome::Samples(Err(format!(
                                "total {} observed mid-transfer, expected {}",
                                total, initial_total
                            )));
                        }
                        TotalConsistency::Weak if !(0..=max_total).contains(&total) => {
                            return ObserverOutcome::Samples(Err(format!(
                                "total {} outside [0, {}]",
                                total, max_total
                            )));
                        }
                        _ => {}
                    }
                    for &id in &ids {
                        match ledger.balance(id) {
                            Ok(balance) if !within_bounds(balance) => {
                                return ObserverOutcome::Samples(Err(format!(
                                    "balance {} of account {} out of bounds",
                                    balance, id
                                )));
                            }
                            Ok(_) => {}
                            Err(e) => return ObserverOutcome::Samples(Err(e.to_string())),
                        }
                    }
                    samples += 1;
                    if running.load(Ordering::Acquire) == 0 {
                        return ObserverOutcome::Samples(Ok(samples));
                    }
                }
            }),
        ));
    }

    let timeout = config.stall_timeout;
    let mut transfers = Tally::default();
    let mut samples = 0;
    for outcome in run_workers(strategy, workers, timeout)? {
        match outcome {
            ObserverOutcome::Transfers(tally) => transfers.merge(tally),
            ObserverOutcome::Samples(Ok(count)) => samples = count,
            ObserverOutcome::Samples(Err(message)) => {
                tracing::error!(strategy, %message, "inconsistent observation");
                return Err(HarnessError::InconsistentObservation {
                    strategy: strategy.to_string(),
                    message,
                });
            }
        }
    }

    let actual_total = ledger.total();
    if actual_total != initial_total {
        return Err(HarnessError::ConservationViolated {
            strategy: strategy.to_string(),
            expected: initial_total,
            actual: actual_total,
        });
    }

    Ok(ObservationReport {
        consistency,
        samples,
        transfers: transfers.succeeded,
    })
}
