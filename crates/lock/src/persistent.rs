use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use n0_future::task::AbortOnDropHandle;
use tracing::{debug, trace, warn};
use uniledger_core::hash::TxAddress;
use uniledger_core::keys::Pubkey;
use uniledger_core::timestamp::Timestamp;
use uniledger_db::Database;
use uniledger_db::error::DbResult;
use uniledger_util_error::fmt::FmtCompact as _;

use crate::tables::{LeaseRecord, lease_locks};
use crate::{AlreadyLockedSnafu, LOG_TARGET, LeaseLocks, LockKey, LockResult};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Lease table persisted in the node database
///
/// Leases survive restarts, so every record carries an absolute expiry and
/// a background task sweeps the expired ones.
pub struct RedbLockStore {
    db: Arc<Database>,
    _sweeper: AbortOnDropHandle<()>,
}

impl RedbLockStore {
    pub async fn open(db: Arc<Database>) -> LockResult<Self> {
        Self::open_with_sweep_interval(db, DEFAULT_SWEEP_INTERVAL).await
    }

    /// Create the lease table if needed and start the sweeper
    pub async fn open_with_sweep_interval(
        db: Arc<Database>,
        interval: Duration,
    ) -> LockResult<Self> {
        db.write_with(|dbtx| {
            dbtx.open_table(&lease_locks::TABLE)?;
            Ok(())
        })
        .await?;

        let sweeper = AbortOnDropHandle::new(tokio::spawn(Self::run_sweeper(db.clone(), interval)));
        Ok(Self {
            db,
            _sweeper: sweeper,
        })
    }

    async fn run_sweeper(db: Arc<Database>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;

            match Self::sweep_expired_in(&db).await {
                Ok(0) => {}
                Ok(num) => debug!(target: LOG_TARGET, num, "Swept expired leases"),
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to sweep expired leases");
                }
            }
        }
    }

    /// Remove all expired leases now, returning how many were removed
    pub async fn sweep_expired(&self) -> LockResult<usize> {
        Ok(Self::sweep_expired_in(&self.db).await?)
    }

    async fn sweep_expired_in(db: &Database) -> DbResult<usize> {
        let now = Timestamp::now();
        db.write_with(|dbtx| {
            let mut tbl = dbtx.open_table(&lease_locks::TABLE)?;

            let mut expired = 0;
            for kv in tbl.range(&TxAddress::MIN..=&TxAddress::MAX)? {
                let (_k, v) = kv?;
                if v.value().expiry <= now {
                    expired += 1;
                }
            }
            if 0 < expired {
                tbl.retain_in(&TxAddress::MIN..=&TxAddress::MAX, |_, record| {
                    now < record.expiry
                })?;
            }
            Ok(expired)
        })
        .await
    }
}

#[async_trait]
impl LeaseLocks for RedbLockStore {
    async fn acquire(&self, key: LockKey, owner: Pubkey, ttl: Duration) -> LockResult<()> {
        let now = Timestamp::now();
        let expiry = now
            .checked_add_duration(ttl)
            .unwrap_or(Timestamp::from(u64::MAX));

        let existing = self
            .db
            .write_with(|dbtx| {
                let mut tbl = dbtx.open_table(&lease_locks::TABLE)?;

                if let Some(existing) = tbl.get(&key.tx_address)?.map(|g| g.value()) {
                    if now < existing.expiry {
                        return Ok(Some(existing));
                    }
                }
                tbl.insert(
                    &key.tx_address,
                    &LeaseRecord {
                        tx_hash: key.tx_hash,
                        owner,
                        expiry,
                    },
                )?;
                Ok(None)
            })
            .await?;

        if let Some(existing) = existing {
            return AlreadyLockedSnafu {
                held: existing.key(key.tx_address),
                owner: existing.owner,
            }
            .fail();
        }
        trace!(target: LOG_TARGET, %key, owner = %owner.to_short(), %expiry, "Lease acquired");
        Ok(())
    }

    async fn release(&self, key: LockKey) -> LockResult<()> {
        let released = self
            .db
            .write_with(|dbtx| {
                let mut tbl = dbtx.open_table(&lease_locks::TABLE)?;
                let is_held = tbl
                    .get(&key.tx_address)?
                    .is_some_and(|g| g.value().tx_hash == key.tx_hash);
                if is_held {
                    tbl.remove(&key.tx_address)?;
                }
                Ok(is_held)
            })
            .await?;
        if released {
            trace!(target: LOG_TARGET, %key, "Lease released");
        }
        Ok(())
    }

    async fn is_locked(&self, key: LockKey) -> LockResult<bool> {
        let now = Timestamp::now();
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl = dbtx.open_table(&lease_locks::TABLE)?;
                Ok(tbl.get(&key.tx_address)?.is_some_and(|g| {
                    let record = g.value();
                    record.tx_hash == key.tx_hash && now < record.expiry
                }))
            })
            .await?)
    }
}
