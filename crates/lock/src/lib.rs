// SPDX-License-Identifier: MIT

//! Lease locks serializing the mining of each transaction chain
//!
//! A lease is held on a chain address, for one transaction of that chain,
//! names the coordinator owning it, and always expires. While a lease is
//! live every other `acquire` on the same address fails fast, whatever the
//! transaction; nothing ever waits for a lease to free up.
//!
//! Two stores implement [`LeaseLocks`]:
//!
//! * [`LockManager`] keeps leases in memory, with a reaper task per lease,
//! * [`RedbLockStore`] persists them, with a periodic sweep of expired
//!   leases.

mod memory;
mod persistent;
mod tables;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bincode::{Decode, Encode};
pub use memory::LockManager;
pub use persistent::RedbLockStore;
use snafu::Snafu;
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::keys::Pubkey;
use uniledger_db::error::DbError;

const LOG_TARGET: &str = "uniledger::lock";

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey {
    pub tx_address: TxAddress,
    pub tx_hash: TxHash,
}

impl LockKey {
    pub fn new(tx_hash: TxHash, tx_address: TxAddress) -> Self {
        Self {
            tx_address,
            tx_hash,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tx_address, self.tx_hash)
    }
}

#[derive(Debug, Snafu)]
pub enum LockError {
    #[snafu(display("Address is already locked as {held} by {}", owner.to_short()))]
    AlreadyLocked { held: LockKey, owner: Pubkey },
    #[snafu(transparent)]
    Db { source: DbError },
}

pub type LockResult<T> = Result<T, LockError>;

#[async_trait]
pub trait LeaseLocks {
    /// Take the lease on `key.tx_address`, for `key.tx_hash`, for `ttl`
    ///
    /// Fails with [`LockError::AlreadyLocked`] if an unexpired lease exists
    /// on the address, even one taken for another transaction.
    async fn acquire(&self, key: LockKey, owner: Pubkey, ttl: Duration) -> LockResult<()>;

    /// Drop the lease on `key`, if any
    ///
    /// A lease on the same address taken for another transaction stays.
    async fn release(&self, key: LockKey) -> LockResult<()>;

    /// Whether an unexpired lease is held on exactly `key`
    async fn is_locked(&self, key: LockKey) -> LockResult<bool>;
}

pub type LeaseLocksRef = Arc<dyn LeaseLocks + Send + Sync + 'static>;
