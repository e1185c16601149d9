use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use uniledger_core::keys::Seckey;
use uniledger_db::Database;
use uniledger_util_error::BoxedErrorResult;

use crate::{LeaseLocks, LeaseLocksRef, LockError, LockKey, LockManager, RedbLockStore};

fn random_key() -> LockKey {
    LockKey::new(rand::random(), rand::random())
}

/// Race `num` acquires of the same key, returning how many won
async fn race_acquire(locks: LeaseLocksRef, key: LockKey, num: usize) -> usize {
    let mut tasks = JoinSet::new();
    for _ in 0..num {
        let locks = locks.clone();
        tasks.spawn(async move {
            locks
                .acquire(key, Seckey::generate().pubkey(), Duration::from_secs(60))
                .await
        });
    }

    let mut winners = 0;
    while let Some(res) = tasks.join_next().await {
        match res.expect("Task panicked") {
            Ok(()) => winners += 1,
            Err(LockError::AlreadyLocked { .. }) => {}
            Err(err) => panic!("Unexpected error: {err}"),
        }
    }
    winners
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn memory_concurrent_acquire_has_one_winner() -> BoxedErrorResult<()> {
    let locks: LeaseLocksRef = Arc::new(LockManager::new());
    let key = random_key();

    assert_eq!(race_acquire(locks.clone(), key, 16).await, 1);
    assert!(locks.is_locked(key).await?);

    locks.release(key).await?;
    assert!(!locks.is_locked(key).await?);
    // Releasing twice is fine
    locks.release(key).await?;

    locks
        .acquire(key, Seckey::generate().pubkey(), Duration::from_secs(60))
        .await?;
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn memory_lease_expires_without_release() -> BoxedErrorResult<()> {
    let locks = LockManager::new();
    let key = random_key();
    let owner = Seckey::generate().pubkey();

    locks.acquire(key, owner, Duration::from_secs(1)).await?;
    assert!(matches!(
        locks.acquire(key, owner, Duration::from_secs(1)).await,
        Err(LockError::AlreadyLocked { .. })
    ));

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!locks.is_locked(key).await?);
    assert_eq!(locks.len(), 0);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn memory_reaper_does_not_remove_newer_lease() -> BoxedErrorResult<()> {
    let locks = LockManager::new();
    let key = random_key();
    let owner = Seckey::generate().pubkey();

    locks.acquire(key, owner, Duration::from_secs(1)).await?;
    locks.release(key).await?;
    locks.acquire(key, owner, Duration::from_secs(10)).await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(locks.is_locked(key).await?);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!locks.is_locked(key).await?);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn memory_shutdown_drops_all_leases() -> BoxedErrorResult<()> {
    let locks = LockManager::new();
    for _ in 0..3 {
        locks
            .acquire(random_key(), Seckey::generate().pubkey(), Duration::from_secs(60))
            .await?;
    }
    assert_eq!(locks.len(), 3);

    locks.shutdown();
    assert_eq!(locks.len(), 0);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn redb_concurrent_acquire_has_one_winner() -> BoxedErrorResult<()> {
    let db = Arc::new(Database::new_in_memory().await?);
    let locks: LeaseLocksRef = Arc::new(RedbLockStore::open(db).await?);
    let key = random_key();

    assert_eq!(race_acquire(locks.clone(), key, 8).await, 1);

    locks.release(key).await?;
    locks
        .acquire(key, Seckey::generate().pubkey(), Duration::from_secs(60))
        .await?;
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn redb_expired_lease_is_free_and_swept() -> BoxedErrorResult<()> {
    let db = Arc::new(Database::new_in_memory().await?);
    let locks = RedbLockStore::open_with_sweep_interval(db, Duration::from_secs(3600)).await?;
    let short = random_key();
    let long = random_key();
    let owner = Seckey::generate().pubkey();

    locks.acquire(short, owner, Duration::from_millis(100)).await?;
    locks.acquire(long, owner, Duration::from_secs(60)).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!locks.is_locked(short).await?);
    assert!(locks.is_locked(long).await?);
    assert_eq!(locks.sweep_expired().await?, 1);
    assert_eq!(locks.sweep_expired().await?, 0);

    // Expired lease doesn't block a new owner even before the sweep
    locks.acquire(short, owner, Duration::from_millis(100)).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    locks
        .acquire(short, Seckey::generate().pubkey(), Duration::from_secs(60))
        .await?;
    Ok(())
}

/// A second transaction of a locked chain is refused, and can't free the lease
async fn other_transaction_of_locked_address_is_refused(locks: LeaseLocksRef) -> BoxedErrorResult<()> {
    let first = random_key();
    let second = LockKey::new(rand::random(), first.tx_address);
    let owner = Seckey::generate().pubkey();

    locks.acquire(first, owner, Duration::from_secs(60)).await?;
    match locks
        .acquire(second, Seckey::generate().pubkey(), Duration::from_secs(60))
        .await
    {
        Err(LockError::AlreadyLocked { held, owner: held_by }) => {
            assert_eq!(held, first);
            assert_eq!(held_by, owner);
        }
        res => panic!("Unexpected result: {res:?}"),
    }
    assert!(!locks.is_locked(second).await?);

    locks.release(second).await?;
    assert!(locks.is_locked(first).await?);

    // Other chains are unaffected
    locks
        .acquire(random_key(), owner, Duration::from_secs(60))
        .await?;

    locks.release(first).await?;
    locks.acquire(second, owner, Duration::from_secs(60)).await?;
    assert!(locks.is_locked(second).await?);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn memory_lease_covers_the_whole_address() -> BoxedErrorResult<()> {
    other_transaction_of_locked_address_is_refused(Arc::new(LockManager::new())).await
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn redb_lease_covers_the_whole_address() -> BoxedErrorResult<()> {
    let db = Arc::new(Database::new_in_memory().await?);
    other_transaction_of_locked_address_is_refused(Arc::new(RedbLockStore::open(db).await?)).await
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_acquire_of_one_address_has_one_winner() -> BoxedErrorResult<()> {
    let locks: LeaseLocksRef = Arc::new(LockManager::new());
    let tx_address = rand::random();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let locks = locks.clone();
        let key = LockKey::new(rand::random(), tx_address);
        tasks.spawn(async move {
            locks
                .acquire(key, Seckey::generate().pubkey(), Duration::from_secs(60))
                .await
        });
    }

    let mut winners = 0;
    while let Some(res) = tasks.join_next().await {
        if res.expect("Task panicked").is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    Ok(())
}
