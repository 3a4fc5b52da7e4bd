//! Coarse-grained locking strategy
//!
//! A single global guard serializes every operation, reads included. The
//! strategy is trivially deadlock-free (one guard, never nested) and its
//! totals are exact snapshots, but throughput is bounded by one critical
//! section regardless of thread count.

use crate::core::traits::ensure_non_negative;
use crate::core::{credit, debit, AccountStore, Ledger, TotalConsistency};
use crate::types::{AccountId, LedgerError, Money};
use parking_lot::Mutex;

/// Ledger guarded by one global mutex
#[derive(Debug)]
pub struct CoarseLedger {
    store: Mutex<AccountStore>,
}

impl CoarseLedger {
    /// Create a ledger with accounts `1..=num_accounts`, each holding `initial`
    pub fn new(num_accounts: usize, initial: Money) -> Self {
        CoarseLedger {
            store: Mutex::new(AccountStore::with_accounts(num_accounts, initial)),
        }
    }
}

impl Ledger for CoarseLedger {
    fn name(&self) -> &'static str {
        "coarse"
    }

    fn deposit(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let store = self.store.lock();
        let balance = store.get(id)?;
        store.set(id, credit(id, balance, amount)?)
    }

    fn withdraw(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let store = self.store.lock();
        let balance = store.get(id)?;
        store.set(id, debit(id, balance, amount)?)
    }

    fn transfer(&self, src: AccountId, dst: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let store = self.store.lock();
        let src_balance = store.get(src)?;
        let dst_balance = store.get(dst)?;
        if src == dst {
            return Ok(());
        }

        let new_src = debit(src, src_balance, amount)?;
        let new_dst = credit(dst, dst_balance, amount)?;
        store.set(src, new_src)?;
        store.set(dst, new_dst)
    }

    fn balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        self.store.lock().get(id)
    }

    fn total(&self) -> Money {
        self.store.lock().total()
    }

    fn total_consistency(&self) -> TotalConsistency {
        TotalConsistency::Linearizable
    }

    fn account_ids(&self) -> Vec<AccountId> {
        self.store.lock().ids()
    }
}
