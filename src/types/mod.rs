//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account identifiers, money and the balance limit
//! - `error`: Error types for the ledger and the stress harness

pub mod account;
pub mod error;

pub use account::{within_bounds, Account, AccountId, Money, MAX_BALANCE};
pub use error::{HarnessError, LedgerError};
