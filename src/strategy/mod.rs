//! Locking strategy module
//!
//! This module defines the interchangeable concurrency-control policies that
//! implement the [`Ledger`] contract, and a factory selecting one at runtime.
//!
//! | Strategy     | Guards                                   | `total()`    |
//! |--------------|------------------------------------------|--------------|
//! | `coarse`     | one global mutex                         | linearizable |
//! | `fine`       | one mutex per account                    | weak         |
//! | `pooled`     | fixed power-of-two pool, `id & (P - 1)`  | weak         |
//! | `hybrid`     | structural rw-lock + one mutex per account | linearizable |
//! | `concurrent` | sharded map + one mutex per account cell | weak         |
//!
//! Every multi-guard acquisition goes through
//! [`GuardPair`](crate::core::GuardPair), which orders guards by a fixed key
//! rather than by argument position.

use crate::core::Ledger;
use crate::types::Money;
use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;

pub mod coarse;
pub mod concurrent;
pub mod fine;
pub mod hybrid;
pub mod pooled;

pub use coarse::CoarseLedger;
pub use concurrent::ConcurrentLedger;
pub use fine::FineLedger;
pub use hybrid::HybridLedger;
pub use pooled::PooledLedger;

/// Available locking strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum StrategyType {
    Coarse,
    Fine,
    Pooled,
    Hybrid,
    Concurrent,
}

impl StrategyType {
    /// Every strategy, in report order
    pub const ALL: [StrategyType; 5] = [
        StrategyType::Coarse,
        StrategyType::Fine,
        StrategyType::Pooled,
        StrategyType::Hybrid,
        StrategyType::Concurrent,
    ];

    /// Name used in reports and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Coarse => "coarse",
            StrategyType::Fine => "fine",
            StrategyType::Pooled => "pooled",
            StrategyType::Hybrid => "hybrid",
            StrategyType::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters needed to construct a ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Accounts `1..=num_accounts` are created up front
    pub num_accounts: usize,
    /// Opening balance of every account
    pub initial_deposit: Money,
    /// Expected number of concurrent threads, used to size the lock pool
    pub pool_threads: usize,
}

/// Create a ledger using the specified strategy
///
/// All strategies start from the same fixed account set so their results are
/// directly comparable.
pub fn create_ledger(strategy_type: StrategyType, config: &LedgerConfig) -> Arc<dyn Ledger> {
    let LedgerConfig {
        num_accounts,
        initial_deposit,
        pool_threads,
    } = *config;

    match strategy_type {
        StrategyType::Coarse => Arc::new(CoarseLedger::new(num_accounts, initial_deposit)),
        StrategyType::Fine => Arc::new(FineLedger::new(num_accounts, initial_deposit)),
        StrategyType::Pooled => Arc::new(PooledLedger::new(
            num_accounts,
            initial_deposit,
            pool_threads,
        )),
        StrategyType::Hybrid => Arc::new(HybridLedger::with_accounts(
            num_accounts,
            initial_deposit,
        )),
        StrategyType::Concurrent => Arc::new(ConcurrentLedger::with_accounts(
            num_accounts,
            initial_deposit,
        )),
    }
}
