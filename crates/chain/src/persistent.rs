use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::projection::{Id, Keychain};
use uniledger_core::transaction::Transaction;
use uniledger_db::Database;
use uniledger_db::error::DbResult;
use uniledger_util_error::BoxedErrorResult;

use crate::LOG_TARGET;
use crate::repository::{LedgerRecord, LedgerRepository};
use crate::tables::{
    ledger_id, ledger_id_by_address, ledger_keychain, ledger_keychain_head, ledger_ko,
    ledger_pending,
};

/// [`LedgerRepository`] persisted in the node database
pub struct RedbLedger {
    db: Arc<Database>,
}

impl RedbLedger {
    /// Create all the tables if needed
    pub async fn open(db: Arc<Database>) -> DbResult<Self> {
        db.write_with(|dbtx| {
            dbtx.open_table(&ledger_pending::TABLE)?;
            dbtx.open_table(&ledger_ko::TABLE)?;
            dbtx.open_table(&ledger_keychain::TABLE)?;
            dbtx.open_table(&ledger_keychain_head::TABLE)?;
            dbtx.open_table(&ledger_id::TABLE)?;
            dbtx.open_table(&ledger_id_by_address::TABLE)?;
            Ok(())
        })
        .await?;
        debug!(target: LOG_TARGET, ephemeral = db.is_ephemeral(), "Opened ledger");

        Ok(Self { db })
    }
}

#[async_trait]
impl LedgerRepository for RedbLedger {
    async fn store_pending(&self, tx: Transaction) -> BoxedErrorResult<()> {
        self.db
            .write_with(|dbtx| {
                let mut tbl = dbtx.open_table(&ledger_pending::TABLE)?;
                tbl.insert(&tx.hash, &tx)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn remove_pending(&self, hash: TxHash) -> BoxedErrorResult<()> {
        self.db
            .write_with(|dbtx| {
                let mut tbl = dbtx.open_table(&ledger_pending::TABLE)?;
                tbl.remove(&hash)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_pending(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl = dbtx.open_table(&ledger_pending::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }

    async fn store_ko(&self, tx: Transaction) -> BoxedErrorResult<()> {
        self.db
            .write_with(|dbtx| {
                let mut tbl = dbtx.open_table(&ledger_ko::TABLE)?;
                tbl.insert(&tx.hash, &tx)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_ko(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl = dbtx.open_table(&ledger_ko::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }

    async fn store_keychain(&self, keychain: Keychain) -> BoxedErrorResult<()> {
        let record = LedgerRecord::new(keychain.transaction);
        let tx = &record.transaction;
        let (hash, address, timestamp) = (tx.hash, tx.address(), tx.timestamp());

        self.db
            .write_with(|dbtx| {
                let mut tbl_heads = dbtx.open_table(&ledger_keychain_head::TABLE)?;
                let is_newer = tbl_heads
                    .get(&address)?
                    .map(|g| g.value())
                    .is_none_or(|(head_timestamp, _)| head_timestamp < timestamp);
                if is_newer {
                    tbl_heads.insert(&address, &(timestamp, hash))?;
                }

                let mut tbl = dbtx.open_table(&ledger_keychain::TABLE)?;
                tbl.insert(&hash, &record)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_keychain(&self, hash: TxHash) -> BoxedErrorResult<Option<LedgerRecord>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl = dbtx.open_table(&ledger_keychain::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }

    async fn get_last_keychain(
        &self,
        address: TxAddress,
    ) -> BoxedErrorResult<Option<LedgerRecord>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl_heads = dbtx.open_table(&ledger_keychain_head::TABLE)?;
                let Some((_, hash)) = tbl_heads.get(&address)?.map(|g| g.value()) else {
                    return Ok(None);
                };
                let tbl = dbtx.open_table(&ledger_keychain::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }

    async fn store_id(&self, id: Id) -> BoxedErrorResult<()> {
        let tx = id.transaction;
        self.db
            .write_with(|dbtx| {
                let mut tbl_by_address = dbtx.open_table(&ledger_id_by_address::TABLE)?;
                tbl_by_address.insert(&tx.address(), &tx.hash)?;

                let mut tbl = dbtx.open_table(&ledger_id::TABLE)?;
                tbl.insert(&tx.hash, &tx)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_id(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl = dbtx.open_table(&ledger_id::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }

    async fn get_id_by_address(
        &self,
        address: TxAddress,
    ) -> BoxedErrorResult<Option<Transaction>> {
        Ok(self
            .db
            .read_with(|dbtx| {
                let tbl_by_address = dbtx.open_table(&ledger_id_by_address::TABLE)?;
                let Some(hash) = tbl_by_address.get(&address)?.map(|g| g.value()) else {
                    return Ok(None);
                };
                let tbl = dbtx.open_table(&ledger_id::TABLE)?;
                Ok(tbl.get(&hash)?.map(|g| g.value()))
            })
            .await?)
    }
}
