//! Concurrent Ledger Library
//! # Overview
//!
//! This library provides an in-memory bank ledger that stays consistent under
//! thousands of concurrent deposits, withdrawals and transfers, behind several
//! interchangeable locking strategies, plus a stress harness that detects both
//! safety violations (wrong totals) and liveness violations (hangs).
//!
//! # Architecture
//!
//! Data flows one way: harness → strategy (through the [`Ledger`] trait) →
//! account store.
//!
//! - [`types`] - Core data types (Account, Money, errors)
//! - [`core`] - Ledger contract and shared building blocks:
//!   - [`core::traits`] - `Ledger` and `AccountLifecycle`
//!   - [`core::account_store`] - Unlocked id → balance storage and bound checks
//!   - [`core::transfer_protocol`] - Ordered two-guard acquisition
//! - [`strategy`] - Locking strategies and the factory selecting one
//! - [`harness`] - Concurrent stress workloads and CSV reports
//! - [`cli`] - CLI arguments parsing
//!
//! # Ledger Contract
//!
//! - **deposit**: Credit an account; the balance may reach but not exceed
//!   [`MAX_BALANCE`]
//! - **withdraw**: Debit an account; the balance may reach but not drop
//!   below zero
//! - **transfer**: Atomically move money between two accounts; a transfer to
//!   self is a no-op
//! - **balance** / **total**: Read one balance or the sum of all balances
//!
//! Every rejected operation reports a [`LedgerError`] and leaves the ledger
//! unchanged.

// Module declarations
pub mod cli;
pub mod core;
pub mod harness;
pub mod strategy;
pub mod types;

pub use core::{AccountLifecycle, Ledger, TotalConsistency};
pub use harness::{StressConfig, StressReport};
pub use strategy::{create_ledger, StrategyType};
pub use types::{Account, AccountId, HarnessError, LedgerError, Money, MAX_BALANCE};
