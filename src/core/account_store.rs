//! Account storage module
//!
//! This module provides the `AccountStore` struct which maps account ids to
//! balances. The store performs no locking of its own: every strategy wraps it
//! with its own guard discipline and only mutates a balance while holding the
//! guard that covers that account.
//!
//! Balances are kept in atomic cells. Reads and writes use relaxed ordering;
//! the guard held by the mutating strategy provides the happens-before edges
//! between successive writers, and the atomic cell guarantees that an
//! unguarded reader (the weakly consistent total) never sees a torn value.

use crate::types::{within_bounds, AccountId, LedgerError, Money, MAX_BALANCE};
use std::sync::atomic::{AtomicI64, Ordering};

/// Mapping from account id to balance for a fixed account set
///
/// Account `id` lives at index `id - 1`. The set is sized at construction and
/// never changes, so the index of an account is stable and strategies can use
/// it to address and order their guards.
#[derive(Debug, Default)]
pub struct AccountStore {
    slots: Box<[AtomicI64]>,
}

impl AccountStore {
    /// Create a store with accounts `1..=num_accounts`, each holding `initial`
    pub fn with_accounts(num_accounts: usize, initial: Money) -> Self {
        debug_assert!(within_bounds(initial));
        AccountStore {
            slots: (0..num_accounts).map(|_| AtomicI64::new(initial)).collect(),
        }
    }

    /// Index of an account in the store
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id lies outside `1..=len()`.
    pub fn index_of(&self, id: AccountId) -> Result<usize, LedgerError> {
        id.checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&index| index < self.slots.len())
            .ok_or_else(|| LedgerError::not_found(id))
    }

    /// Current balance of an account
    pub fn get(&self, id: AccountId) -> Result<Money, LedgerError> {
        self.cell(id).map(|cell| cell.load(Ordering::Relaxed))
    }

    /// Overwrite the balance of an account
    ///
    /// Only called by a strategy holding the guard covering `id`, with a value
    /// produced by [`credit`] or [`debit`].
    pub(crate) fn set(&self, id: AccountId, balance: Money) -> Result<(), LedgerError> {
        debug_assert!(within_bounds(balance));
        self.cell(id)
            .map(|cell| cell.store(balance, Ordering::Relaxed))
    }

    /// Sum of all balances
    ///
    /// Every individual read is atomic; the sum as a whole is only exact if
    /// no mutation runs concurrently with the fold.
    pub fn total(&self) -> Money {
        self.slots
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .sum()
    }

    /// Ids of all accounts in ascending order
    pub fn ids(&self) -> Vec<AccountId> {
        (1..=self.slots.len() as AccountId).collect()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no account
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn cell(&self, id: AccountId) -> Result<&AtomicI64, LedgerError> {
        let index = self.index_of(id)?;
        Ok(&self.slots[index])
    }
}

/// Balance after crediting `amount`, or `BalanceOverflow`
///
/// `balance + amount == MAX_BALANCE` is allowed.
pub fn credit(id: AccountId, balance: Money, amount: Money) -> Result<Money, LedgerError> {
    if amount > MAX_BALANCE - balance {
        return Err(LedgerError::balance_overflow(id, amount, balance));
    }
    Ok(balance + amount)
}

/// Balance after debiting `amount`, or `InsufficientBalance`
///
/// Debiting the whole balance is allowed and leaves zero.
pub fn debit(id: AccountId, balance: Money, amount: Money) -> Result<Money, LedgerError> {
    if amount > balance {
        return Err(LedgerError::insufficient_balance(id, amount, balance));
    }
    Ok(balance - amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_with_accounts_allocates_sequential_ids() {
        let store = AccountStore::with_accounts(3, 10);

        assert_eq!(store.ids(), vec![1, 2, 3]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.total(), 30);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::past_end(4)]
    #[case::far_past_end(u64::MAX)]
    fn test_unknown_ids_are_not_found(#[case] id: AccountId) {
        let store = AccountStore::with_accounts(3, 0);

        assert_eq!(store.get(id), Err(LedgerError::not_found(id)));
        assert_eq!(store.set(id, 1), Err(LedgerError::not_found(id)));
        assert_eq!(store.index_of(id), Err(LedgerError::not_found(id)));
    }

    #[test]
    fn test_set_then_get() {
        let store = AccountStore::with_accounts(2, 0);

        store.set(2, 77).unwrap();

        assert_eq!(store.get(2), Ok(77));
        assert_eq!(store.get(1), Ok(0));
        assert_eq!(store.total(), 77);
    }

    #[test]
    fn test_empty_store() {
        let store = AccountStore::with_accounts(0, 0);

        assert!(store.is_empty());
        assert_eq!(store.ids(), Vec::<AccountId>::new());
        assert_eq!(store.get(1), Err(LedgerError::not_found(1)));
        assert_eq!(store.total(), 0);
    }

    #[test]
    fn test_index_follows_id() {
        let store = AccountStore::with_accounts(3, 0);

        assert_eq!(store.index_of(1), Ok(0));
        assert_eq!(store.index_of(3), Ok(2));
    }

    #[rstest]
    #[case::to_limit(MAX_BALANCE - 10, 10, Ok(MAX_BALANCE))]
    #[case::past_limit(MAX_BALANCE - 10, 11, Err(LedgerError::balance_overflow(1, 11, MAX_BALANCE - 10)))]
    #[case::zero_amount(MAX_BALANCE, 0, Ok(MAX_BALANCE))]
    fn test_credit(
        #[case] balance: Money,
        #[case] amount: Money,
        #[case] expected: Result<Money, LedgerError>,
    ) {
        assert_eq!(credit(1, balance, amount), expected);
    }

    #[rstest]
    #[case::whole_balance(25, 25, Ok(0))]
    #[case::one_more(25, 26, Err(LedgerError::insufficient_balance(1, 26, 25)))]
    #[case::from_empty(0, 0, Ok(0))]
    fn test_debit(
        #[case] balance: Money,
        #[case] amount: Money,
        #[case] expected: Result<Money, LedgerError>,
    ) {
        assert_eq!(debit(1, balance, amount), expected);
    }
}
