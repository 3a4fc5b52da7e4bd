//! Stress run configuration
//!
//! Controls the account set every strategy starts from and the shape of the
//! concurrent workload driven against it.

use crate::strategy::LedgerConfig;
use crate::types::{HarnessError, Money, MAX_BALANCE};
use std::time::Duration;

/// Configuration for a stress run
#[derive(Clone, Debug, PartialEq)]
pub struct StressConfig {
    /// Accounts `1..=num_accounts` are created before the run
    pub num_accounts: usize,
    /// Opening balance of every account
    pub initial_deposit: Money,
    /// Number of sweeps over all accounts performed by each worker
    pub repeats: usize,
    /// Worker threads per operation kind (deposit, withdraw, transfer)
    pub threads_per_operation: usize,
    /// Expected concurrency used to size the pooled strategy's lock pool
    pub pool_threads: usize,
    /// Longest time the workers may take before the run is declared stalled
    pub stall_timeout: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            num_accounts: 100,
            initial_deposit: 1000,
            repeats: 1000,
            threads_per_operation: 2,
            pool_threads: num_cpus::get(),
            stall_timeout: Duration::from_secs(60),
        }
    }
}

impl StressConfig {
    /// Create a StressConfig with custom values
    ///
    /// Zero counts and a zero timeout fall back to their defaults with a
    /// warning. The pool is sized for whichever is larger: the CPU count or the
    /// number of worker threads.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `initial_deposit` is negative or above
    /// `MAX_BALANCE`, or if the thread count or the total operation count
    /// overflows.
    pub fn new(
        num_accounts: usize,
        initial_deposit: Money,
        repeats: usize,
        threads_per_operation: usize,
        stall_timeout: Duration,
    ) -> Result<Self, HarnessError> {
        let default = Self::default();

        if !(0..=MAX_BALANCE).contains(&initial_deposit) {
            return Err(HarnessError::InvalidConfig {
                message: format!(
                    "initial_deposit {} must lie within [0, {}]",
                    initial_deposit, MAX_BALANCE
                ),
            });
        }

        let num_accounts = or_default("num_accounts", num_accounts, default.num_accounts);
        let repeats = or_default("repeats", repeats, default.repeats);
        let threads_per_operation = or_default(
            "threads_per_operation",
            threads_per_operation,
            default.threads_per_operation,
        );
        let stall_timeout = if stall_timeout.is_zero() {
            tracing::warn!(
                default = ?default.stall_timeout,
                "Invalid stall_timeout (0), using default"
            );
            default.stall_timeout
        } else {
            stall_timeout
        };

        let worker_threads = threads_per_operation
            .checked_mul(OPERATION_KINDS)
            .ok_or_else(|| too_large("threads_per_operation", threads_per_operation))?;
        num_accounts
            .checked_mul(repeats)
            .and_then(|sweeps| sweeps.checked_mul(worker_threads))
            .ok_or_else(|| too_large("num_accounts * repeats", num_accounts))?;

        Ok(Self {
            num_accounts,
            initial_deposit,
            repeats,
            threads_per_operation,
            pool_threads: default.pool_threads.max(worker_threads),
            stall_timeout,
        })
    }

    /// Ledger construction parameters
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            num_accounts: self.num_accounts,
            initial_deposit: self.initial_deposit,
            pool_threads: self.pool_threads,
        }
    }

    /// Total worker threads in a conservation run
    pub fn worker_threads(&self) -> usize {
        self.threads_per_operation.saturating_mul(OPERATION_KINDS)
    }

    /// Operations attempted by one conservation run
    pub fn total_operations(&self) -> u64 {
        (self.num_accounts as u64)
            .saturating_mul(self.repeats as u64)
            .saturating_mul(self.worker_threads() as u64)
    }
}

/// Deposit, withdraw and transfer
const OPERATION_KINDS: usize = 3;

fn too_large(field: &str, value: usize) -> HarnessError {
    HarnessError::InvalidConfig {
        message: format!("{} ({}) overflows the operation count", field, value),
    }
}

fn or_default(field: &str, value: usize, default: usize) -> usize {
    if value == 0 {
        tracing::warn!(field, default, "Invalid {} (0), using default", field);
        default
    } else {
        value
    }
}
