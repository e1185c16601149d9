use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::projection::{Id, Keychain};
use uniledger_core::timestamp::Timestamp;
use uniledger_core::transaction::Transaction;
use uniledger_util_error::BoxedErrorResult;

use crate::repository::{LedgerRecord, LedgerRepository};

#[derive(Default)]
struct Stores {
    pending: HashMap<TxHash, Transaction>,
    ko: HashMap<TxHash, Transaction>,
    keychain: HashMap<TxHash, LedgerRecord>,
    keychain_heads: HashMap<TxAddress, (Timestamp, TxHash)>,
    id: HashMap<TxHash, Transaction>,
    id_by_address: HashMap<TxAddress, TxHash>,
}

/// [`LedgerRepository`] kept in memory, for tests and ephemeral nodes
#[derive(Default)]
pub struct MemLedger {
    stores: RwLock<Stores>,
}

impl MemLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for MemLedger {
    async fn store_pending(&self, tx: Transaction) -> BoxedErrorResult<()> {
        self.stores.write().await.pending.insert(tx.hash, tx);
        Ok(())
    }

    async fn remove_pending(&self, hash: TxHash) -> BoxedErrorResult<()> {
        self.stores.write().await.pending.remove(&hash);
        Ok(())
    }

    async fn get_pending(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self.stores.read().await.pending.get(&hash).cloned())
    }

    async fn store_ko(&self, tx: Transaction) -> BoxedErrorResult<()> {
        self.stores.write().await.ko.insert(tx.hash, tx);
        Ok(())
    }

    async fn get_ko(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self.stores.read().await.ko.get(&hash).cloned())
    }

    async fn store_keychain(&self, keychain: Keychain) -> BoxedErrorResult<()> {
        let record = LedgerRecord::new(keychain.transaction);
        let tx = &record.transaction;
        let (hash, address, timestamp) = (tx.hash, tx.address(), tx.timestamp());

        let mut stores = self.stores.write().await;
        let is_newer = stores
            .keychain_heads
            .get(&address)
            .is_none_or(|(head_timestamp, _)| *head_timestamp < timestamp);
        if is_newer {
            stores.keychain_heads.insert(address, (timestamp, hash));
        }
        stores.keychain.insert(hash, record);
        Ok(())
    }

    async fn get_keychain(&self, hash: TxHash) -> BoxedErrorResult<Option<LedgerRecord>> {
        Ok(self.stores.read().await.keychain.get(&hash).cloned())
    }

    async fn get_last_keychain(
        &self,
        address: TxAddress,
    ) -> BoxedErrorResult<Option<LedgerRecord>> {
        let stores = self.stores.read().await;
        Ok(stores
            .keychain_heads
            .get(&address)
            .and_then(|(_, hash)| stores.keychain.get(hash))
            .cloned())
    }

    async fn store_id(&self, id: Id) -> BoxedErrorResult<()> {
        let tx = id.transaction;
        let mut stores = self.stores.write().await;
        stores.id_by_address.insert(tx.address(), tx.hash);
        stores.id.insert(tx.hash, tx);
        Ok(())
    }

    async fn get_id(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self.stores.read().await.id.get(&hash).cloned())
    }

    async fn get_id_by_address(
        &self,
        address: TxAddress,
    ) -> BoxedErrorResult<Option<Transaction>> {
        let stores = self.stores.read().await;
        Ok(stores
            .id_by_address
            .get(&address)
            .and_then(|hash| stores.id.get(hash))
            .cloned())
    }
}
