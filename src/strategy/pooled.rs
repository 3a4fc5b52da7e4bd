//! Pooled locking strategy
//!
//! For very large account counts one guard per account is memory-expensive.
//! This strategy keeps a fixed pool of `P` guards, `P` a power of two, and
//! maps account `id` onto slot `id & (P - 1)`. Unrelated accounts may share a
//! slot (false contention), which only adds serialization.
//!
//! Transfers order acquisition by the *mapped* slot index, never by account
//! id: two accounts with ids `a < b` can map onto slots `sa > sb`, and
//! ordering by id would then reintroduce a cycle with a transfer whose ids
//! map the other way round. Two accounts mapped onto one slot take it once.

use crate::core::traits::ensure_non_negative;
use crate::core::{credit, debit, AccountStore, GuardPair, Ledger, TotalConsistency};
use crate::types::{AccountId, LedgerError, Money};
use parking_lot::Mutex;

/// Guards allocated per expected concurrent thread
pub const GUARDS_PER_THREAD: usize = 20;

/// Ledger whose accounts share a fixed pool of mutexes
#[derive(Debug)]
pub struct PooledLedger {
    store: AccountStore,
    pool: Box<[Mutex<()>]>,
    mask: usize,
}

impl PooledLedger {
    /// Create a ledger with accounts `1..=num_accounts`, each holding `initial`
    ///
    /// The pool holds the next power of two at or above
    /// `expected_threads * GUARDS_PER_THREAD` guards, capped at
    /// `MAX_POOL_SIZE`.
    pub fn new(num_accounts: usize, initial: Money, expected_threads: usize) -> Self {
        let pool_size = pool_size_for(expected_threads);
        tracing::debug!(num_accounts, pool_size, "creating pooled ledger");
        PooledLedger {
            store: AccountStore::with_accounts(num_accounts, initial),
            pool: (0..pool_size).map(|_| Mutex::new(())).collect(),
            mask: pool_size - 1,
        }
    }

    /// Number of guards in the pool
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Pool slot covering an account
    pub fn slot_of(&self, id: AccountId) -> usize {
        (id as usize) & self.mask
    }

    fn guarded_slot(&self, id: AccountId) -> Result<usize, LedgerError> {
        self.store.index_of(id)?;
        Ok(self.slot_of(id))
    }
}

/// Largest pool ever allocated
pub const MAX_POOL_SIZE: usize = 1 << 20;

/// Pool size for the given expected concurrency, capped at `MAX_POOL_SIZE`
pub fn pool_size_for(expected_threads: usize) -> usize {
    expected_threads
        .max(1)
        .saturating_mul(GUARDS_PER_THREAD)
        .min(MAX_POOL_SIZE)
        .next_power_of_two()
}

impl Ledger for PooledLedger {
    fn name(&self) -> &'static str {
        "pooled"
    }

    fn deposit(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let slot = self.guarded_slot(id)?;

        let _guard = self.pool[slot].lock();
        let balance = self.store.get(id)?;
        self.store.set(id, credit(id, balance, amount)?)
    }

    fn withdraw(&self, id: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let slot = self.guarded_slot(id)?;

        let _guard = self.pool[slot].lock();
        let balance = self.store.get(id)?;
        self.store.set(id, debit(id, balance, amount)?)
    }

    fn transfer(&self, src: AccountId, dst: AccountId, amount: Money) -> Result<(), LedgerError> {
        ensure_non_negative(amount)?;
        let src_slot = self.guarded_slot(src)?;
        let dst_slot = self.guarded_slot(dst)?;
        if src == dst {
            return Ok(());
        }

        let _guards = GuardPair::acquire(
            (src_slot, &self.pool[src_slot]),
            (dst_slot, &self.pool[dst_slot]),
        );
        let new_src = debit(src, self.store.get(src)?, amount)?;
        let new_dst = credit(dst, self.store.get(dst)?, amount)?;
        self.store.set(src, new_src)?;
        self.store.set(dst, new_dst)
    }

    fn balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        let slot = self.guarded_slot(id)?;
        let _guard = self.pool[slot].lock();
        self.store.get(id)
    }

    fn total(&self) -> Money {
        self.store.total()
    }

    fn total_consistency(&self) -> TotalConsistency {
        TotalConsistency::Weak
    }

    fn account_ids(&self) -> Vec<AccountId> {
        self.store.ids()
    }
}
