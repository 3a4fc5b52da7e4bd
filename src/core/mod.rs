//! Core ledger module
//!
//! This module contains the building blocks shared by every locking strategy:
//! - `traits` - The `Ledger` contract and the `AccountLifecycle` extension
//! - `account_store` - Lock-free balance storage guarded by the strategies
//! - `transfer_protocol` - Ordered two-guard acquisition for transfers

pub mod account_store;
pub mod traits;
pub mod transfer_protocol;

pub use account_store::{credit, debit, AccountStore};
pub use traits::{AccountLifecycle, Ledger, TotalConsistency};
pub use transfer_protocol::GuardPair;
