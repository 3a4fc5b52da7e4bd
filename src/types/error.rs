//! Error types for the concurrent ledger
//!
//! This module defines the domain errors reported by every ledger operation
//! and the fatal errors reported by the stress harness.
//!
//! # Error Categories
//!
//! - **Ledger Errors**: invalid amounts, unknown accounts and balance bound
//!   violations. All are local, synchronous and recoverable; the ledger stays
//!   consistent and every guard taken during validation has been released.
//! - **Harness Errors**: conservation violations, stalled or panicking worker
//!   threads, invalid configuration and report I/O failures. These are fatal
//!   for a stress run.

use super::account::{AccountId, Money};
use std::time::Duration;
use thiserror::Error;

/// Error returned by ledger operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The amount is negative
    #[error("Invalid argument: negative amount {amount}")]
    InvalidArgument {
        /// The rejected amount
        amount: Money,
    },

    /// The account does not exist
    #[error("Account not found: {account}")]
    NotFound {
        /// The unknown account id
        account: AccountId,
    },

    /// The operation would push the balance above `MAX_BALANCE`
    #[error("Amount exceeds limit: {amount} at current balance {balance} for account {account}")]
    BalanceOverflow {
        /// The account whose limit would be exceeded
        account: AccountId,
        /// The requested amount
        amount: Money,
        /// The balance observed under the account's guard
        balance: Money,
    },

    /// The amount exceeds the source balance
    #[error("Amount exceeds balance: {amount} at current balance {balance} for account {account}")]
    InsufficientBalance {
        /// The account that would go negative
        account: AccountId,
        /// The requested amount
        amount: Money,
        /// The balance observed under the account's guard
        balance: Money,
    },
}

impl LedgerError {
    /// Create an InvalidArgument error
    pub fn invalid_argument(amount: Money) -> Self {
        LedgerError::InvalidArgument { amount }
    }

    /// Create a NotFound error
    pub fn not_found(account: AccountId) -> Self {
        LedgerError::NotFound { account }
    }

    /// Create a BalanceOverflow error
    pub fn balance_overflow(account: AccountId, amount: Money, balance: Money) -> Self {
        LedgerError::BalanceOverflow {
            account,
            amount,
            balance,
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(account: AccountId, amount: Money, balance: Money) -> Self {
        LedgerError::InsufficientBalance {
            account,
            amount,
            balance,
        }
    }

    /// Whether the error comes from a balance bound check
    ///
    /// Bound rejections are the normal outcome of racing operations against
    /// the balance limits and are tallied as failed attempts by the harness.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::BalanceOverflow { .. } | LedgerError::InsufficientBalance { .. }
        )
    }
}

/// Fatal outcome of a stress run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarnessError {
    /// The final total differs from the one derived from successful operations
    #[error("Thread-safety broken for {strategy}: expected total {expected}, actual total {actual}")]
    ConservationViolated {
        /// Strategy under test
        strategy: String,
        /// `initial + deposited - withdrawn`
        expected: Money,
        /// `ledger.total()` after all workers joined
        actual: Money,
    },

    /// A concurrent reader observed a state no correct ledger may expose
    #[error("Inconsistent observation for {strategy}: {message}")]
    InconsistentObservation {
        /// Strategy under test
        strategy: String,
        /// What was observed
        message: String,
    },

    /// A worker thread panicked
    #[error("Worker '{worker}' panicked while driving {strategy}")]
    WorkerPanicked {
        /// Strategy under test
        strategy: String,
        /// Name of the worker
        worker: String,
    },

    /// Workers did not finish before the stall timeout
    #[error("Workers driving {strategy} did not finish within {timeout:?}")]
    Stalled {
        /// Strategy under test
        strategy: String,
        /// The configured stall timeout
        timeout: Duration,
    },

    /// The stress configuration cannot be used
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem
        message: String,
    },

    /// Writing a report failed
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },
}

impl From<std::io::Error> for HarnessError {
    fn from(error: std::io::Error) -> Self {
        HarnessError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for HarnessError {
    fn from(error: csv::Error) -> Self {
        HarnessError::Io {
            message: error.to_string(),
        }
    }
}
