//! Core traits for ledger operations and account lifecycle
//!
//! This module defines the contract implemented identically by every locking
//! strategy, so the stress harness and callers can drive any strategy through
//! a trait object.

use crate::core::account_store::credit;
use crate::types::{Account, AccountId, LedgerError, Money};

/// Consistency guarantee of [`Ledger::total`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalConsistency {
    /// The total reflects a single instant: no in-flight transfer is visible
    Linearizable,

    /// The total is a fold over independently read balances
    ///
    /// Each balance read is atomic, so no single account is ever observed
    /// half-written, but a transfer running during the fold may be counted
    /// on neither side or on both. Once all mutations have completed the fold
    /// is exact.
    Weak,
}

/// Trait for a thread-safe ledger of account balances
///
/// Every balance-mutating operation validates its bounds after acquiring the
/// guard(s) protecting the touched accounts, and releases every guard before
/// returning, on success and on error alike.
pub trait Ledger: Send + Sync {
    /// Short name of the locking strategy, used in reports and logs
    fn name(&self) -> &'static str;

    /// Credit `amount` to an account
    ///
    /// Fails with `InvalidArgument` for a negative amount, `NotFound` for an
    /// unknown account and `BalanceOverflow` if the balance would exceed
    /// `MAX_BALANCE`.
    fn deposit(&self, id: AccountId, amount: Money) -> Result<(), LedgerError>;

    /// Debit `amount` from an account
    ///
    /// Fails with `InvalidArgument`, `NotFound`, or `InsufficientBalance` if
    /// the amount exceeds the balance.
    fn withdraw(&self, id: AccountId, amount: Money) -> Result<(), LedgerError>;

    /// Atomically move `amount` from `src` to `dst`
    ///
    /// Fails with `InvalidArgument`, `NotFound` on either id,
    /// `InsufficientBalance` on the source or `BalanceOverflow` on the
    /// destination. A transfer to self is a successful no-op.
    fn transfer(&self, src: AccountId, dst: AccountId, amount: Money) -> Result<(), LedgerError>;

    /// Current balance of an account
    fn balance(&self, id: AccountId) -> Result<Money, LedgerError>;

    /// Sum of all balances
    fn total(&self) -> Money;

    /// Guarantee offered by [`Ledger::total`]
    fn total_consistency(&self) -> TotalConsistency;

    /// Identifiers of all live accounts, in ascending order
    fn account_ids(&self) -> Vec<AccountId>;

    /// Snapshot of every live account, sorted by id
    ///
    /// Accounts deleted between listing and reading are skipped.
    fn accounts(&self) -> Vec<Account> {
        self.account_ids()
            .into_iter()
            .filter_map(|id| self.balance(id).ok().map(|balance| Account::new(id, balance)))
            .collect()
    }
}

/// Trait for ledgers whose set of accounts can change at runtime
pub trait AccountLifecycle: Ledger {
    /// Open a new account holding `initial_deposit`
    ///
    /// Fails with `InvalidArgument` for a negative deposit and
    /// `BalanceOverflow` for a deposit above `MAX_BALANCE`. Identifiers are
    /// allocated monotonically and never reused.
    fn create_account(&self, initial_deposit: Money) -> Result<AccountId, LedgerError>;

    /// Close an account, returning its final balance
    fn delete_account(&self, id: AccountId) -> Result<Money, LedgerError>;
}

/// Reject negative amounts before any guard is taken
pub(crate) fn ensure_non_negative(amount: Money) -> Result<(), LedgerError> {
    if amount < 0 {
        return Err(LedgerError::invalid_argument(amount));
    }
    Ok(())
}

/// Validate the opening balance of a new account
///
/// The account has no id yet, so an overflow is reported against id 0.
pub(crate) fn ensure_opening_balance(amount: Money) -> Result<(), LedgerError> {
    ensure_non_negative(amount)?;
    credit(0, 0, amount).map(|_| ())
}
