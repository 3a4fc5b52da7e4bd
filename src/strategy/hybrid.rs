//! Hybrid read/write locking strategy
//!
//! A read/write guard protects the *set* of accounts, and one mutex per
//! account protects its value. Value operations take the shared side of the
//! read/write guard and then their account guard(s), so mutations on
//! different accounts proceed in parallel. Creating or deleting an account
//! takes the exclusive side and waits for every in-flight value operation.
//!
//! Accounts live in an ordered map keyed by id; a deleted account is removed
//! from the map together with its mutex. Acquisition order is always the
//! read/write guard first, then account guards in ascending id order. Totals
//! take the exclusive side and are exact snapshots.

use crate::core::traits::{ensure_non_negative, ensure_opening_balance};
use crate::core::{credit, debit, AccountLifecycle, GuardPair, Ledger, TotalConsistency};
use crate::types::{AccountId, LedgerError, Money};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;

#[derive(Debug)]
struct AccountTable {
    accounts: BTreeMap<AccountId, Mutex<Money>>,
    next_id: AccountId,
}

impl AccountTable {
    fn account(&self, id: AccountId) -> Result<&Mutex<Money>, LedgerError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(id))
    }
}

/// Ledger combining a structural read/write guard with per-account guards
#[derive(Debug)]
pub struct HybridLedger {
    table: RwLock<AccountTable>,
}

impl HybridLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::with_accounts(0, 0)
    }

    /// Create a ledger with accounts `1..=num_accounts`, each holding `initial`
    pub fn with_accounts(num_accounts: usize, initial: Money) -> Self {
        let num_accounts = num_accounts as AccountId;
        HybridLedger {
            table: RwLock::new(AccountTable {
                accounts: (1..=num_accounts)
                    .map(|id| (id, Mutex::new(initial)))
                    .collect(),
                next_id: num_accounts + 1,
            }),
        }
    }
}

impl Default for HybridLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for HybridLedger {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn deposit(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let table = self.table.read();

        let mut balance = table.account(id)?.lock();
        *balance = credit(id, *balance, amount)?;
        Ok(())
    }

    fn withdraw(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let table = self.table.read();

        let mut balance = table.account(id)?.lock();
        *balance = debit(id, *balance, amount)?;
        Ok(())
    }

    fn transfer(&self, src: AccountId, dst: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let table = self.table.read();
        let src_account = table.account(src)?;
        let dst_account = table.account(dst)?;
        if src == dst {
            return Ok(());
        }

        let mut guards = GuardPair::acquire((src, src_account), (dst, dst_account));
        let Some((src_balance, dst_balance)) = guards.split_mut() else {
            unreachable!("distinct accounts have distinct mutexes");
        };
        let new_src = debit(src, *src_balance, amount)?;
        let new_dst = credit(dst, *dst_balance, amount)?;
        *src_balance = new_src;
        *dst_balance = new_dst;
        Ok(())
    }

    fn balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        let table = self.table.read();
        let balance = *table.account(id)?.lock();
        Ok(balance)
    }

    fn total(&self) -> Money {
        let mut table = self.table.write();
        table.accounts.values_mut().map(|balance| *balance.get_mut()).sum()
    }

    fn total_consistency(&self) -> TotalConsistency {
        TotalConsistency::Linearizable
    }

    fn account_ids(&self) -> Vec<AccountId> {
        self.table.read().accounts.keys().copied().collect()
    }
}

impl AccountLifecycle for HybridLedger {
    fn create_account(&self, initial_deposit: Money) -> Result<AccountId, LedgerError> {
        ensure_opening_balance(initial_deposit)?;

        let mut table = self.table.write();
        let id = table.next_id;
        table.next_id += 1;
        table.accounts.insert(id, Mutex::new(initial_deposit));
        Ok(id)
    }

    fn delete_account(&self, id: AccountId) -> Result<Money, LedgerError> {
        self.table
            .write()
            .accounts
            .remove(&id)
            .map(Mutex::into_inner)
            .ok_or_else(|| LedgerError::not_found(id))
    }
}
