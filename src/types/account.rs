//! Account-related types for the concurrent ledger
//!
//! This module defines account identifiers, the money type, the balance limit
//! and the `Account` snapshot used for reporting.

use serde::Serialize;

/// Account identifier
///
/// Accounts are numbered from 1. Identifiers are stable for the lifetime of
/// an account and are never reused after deletion.
pub type AccountId = u64;

/// Amount of money, in whole units
///
/// Signed so that a negative amount can reach the ledger and be rejected
/// with [`LedgerError::InvalidArgument`](crate::types::LedgerError::InvalidArgument).
pub type Money = i64;

/// Upper bound for every account's balance (2^20)
///
/// A balance may be exactly `MAX_BALANCE`; exceeding it is rejected.
pub const MAX_BALANCE: Money = 1 << 20;

/// Point-in-time view of a single account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    /// The account identifier
    #[serde(rename = "account")]
    pub id: AccountId,

    /// Balance at the time the snapshot was taken
    pub balance: Money,
}

impl Account {
    /// Create a new account snapshot
    pub fn new(id: AccountId, balance: Money) -> Self {
        Account { id, balance }
    }
}

/// Whether `balance` lies within `[0, MAX_BALANCE]`
pub fn within_bounds(balance: Money) -> bool {
    (0..=MAX_BALANCE).contains(&balance)
}
