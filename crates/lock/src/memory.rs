use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use n0_future::task::AbortOnDropHandle;
use snafu::ensure;
use tokio::time::Instant;
use tracing::{debug, trace};
use uniledger_core::hash::TxAddress;
use uniledger_core::keys::Pubkey;

use crate::{AlreadyLockedSnafu, LOG_TARGET, LeaseLocks, LockKey, LockResult};

struct LeaseEntry {
    key: LockKey,
    owner: Pubkey,
    expiry: Instant,
    /// Distinguishes a re-acquired lease from the one a reaper was spawned for
    lease_id: u64,
    /// Aborted on drop, i.e. when the lease is released or replaced
    _reaper: AbortOnDropHandle<()>,
}

impl LeaseEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expiry
    }
}

/// One entry per chain address
type LockTable = HashMap<TxAddress, LeaseEntry>;

/// In-memory lease table
///
/// Every lease gets its own reaper task removing it at expiry. Dropping the
/// manager (or calling [`LockManager::shutdown`]) aborts all of them.
pub struct LockManager {
    table: Arc<Mutex<LockTable>>,
    next_lease_id: AtomicU64,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            next_lease_id: AtomicU64::new(0),
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().expect("Locking failed")
    }

    /// Drop all leases and abort their reapers
    pub fn shutdown(&self) {
        let leases = std::mem::take(&mut *self.lock_table());
        debug!(target: LOG_TARGET, num = leases.len(), "Shutting down lock manager");
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_table().len()
    }

    fn spawn_reaper(
        &self,
        address: TxAddress,
        lease_id: u64,
        expiry: Instant,
    ) -> AbortOnDropHandle<()> {
        let table = Arc::downgrade(&self.table);
        AbortOnDropHandle::new(tokio::spawn(reap_at(table, address, lease_id, expiry)))
    }
}

async fn reap_at(
    table: Weak<Mutex<LockTable>>,
    address: TxAddress,
    lease_id: u64,
    expiry: Instant,
) {
    tokio::time::sleep_until(expiry).await;

    let Some(table) = table.upgrade() else {
        return;
    };
    let expired = {
        let mut table = table.lock().expect("Locking failed");
        if table
            .get(&address)
            .is_some_and(|entry| entry.lease_id == lease_id)
        {
            table.remove(&address)
        } else {
            None
        }
    };
    if let Some(expired) = expired {
        debug!(
            target: LOG_TARGET,
            key = %expired.key,
            owner = %expired.owner.to_short(),
            "Lease expired"
        );
        // Dropping the entry aborts this very task, which is about to finish anyway
        drop(expired);
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl LeaseLocks for LockManager {
    async fn acquire(&self, key: LockKey, owner: Pubkey, ttl: Duration) -> LockResult<()> {
        let now = Instant::now();
        let replaced = {
            let mut table = self.lock_table();

            if let Some(existing) = table.get(&key.tx_address) {
                ensure!(
                    !existing.is_live(now),
                    AlreadyLockedSnafu {
                        held: existing.key,
                        owner: existing.owner,
                    }
                );
            }

            let lease_id = self.next_lease_id.fetch_add(1, Ordering::Relaxed);
            let expiry = now + ttl;
            table.insert(
                key.tx_address,
                LeaseEntry {
                    key,
                    owner,
                    expiry,
                    lease_id,
                    _reaper: self.spawn_reaper(key.tx_address, lease_id, expiry),
                },
            )
        };

        trace!(
            target: LOG_TARGET,
            %key,
            owner = %owner.to_short(),
            ttl_secs = ttl.as_secs_f32(),
            replaced_expired = replaced.is_some(),
            "Lease acquired"
        );
        Ok(())
    }

    async fn release(&self, key: LockKey) -> LockResult<()> {
        let released = {
            let mut table = self.lock_table();
            if table
                .get(&key.tx_address)
                .is_some_and(|entry| entry.key == key)
            {
                table.remove(&key.tx_address)
            } else {
                None
            }
        };
        if let Some(released) = released {
            trace!(
                target: LOG_TARGET,
                %key,
                owner = %released.owner.to_short(),
                "Lease released"
            );
        }
        Ok(())
    }

    async fn is_locked(&self, key: LockKey) -> LockResult<bool> {
        let now = Instant::now();
        Ok(self
            .lock_table()
            .get(&key.tx_address)
            .is_some_and(|entry| entry.key == key && entry.is_live(now)))
    }
}
