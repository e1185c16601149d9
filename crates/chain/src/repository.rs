use std::sync::Arc;

use async_trait::async_trait;
use bincode::{Decode, Encode};
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::projection::{Id, Keychain};
use uniledger_core::transaction::Transaction;
use uniledger_util_error::BoxedErrorResult;

/// A stored keychain link
///
/// Ancestors are stored as links of their own, so only the hash of the
/// direct one is kept.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct LedgerRecord {
    pub transaction: Transaction,
    pub previous_hash: Option<TxHash>,
}

impl LedgerRecord {
    pub fn new(transaction: Transaction) -> Self {
        let (transaction, previous_hash) = transaction.detach_previous();
        Self {
            transaction,
            previous_hash,
        }
    }
}

/// Pending, KO, keychain and id stores of one node
#[async_trait]
pub trait LedgerRepository {
    /// Record a transaction currently being mined
    async fn store_pending(&self, tx: Transaction) -> BoxedErrorResult<()>;
    async fn remove_pending(&self, hash: TxHash) -> BoxedErrorResult<()>;
    async fn get_pending(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>>;

    async fn store_ko(&self, tx: Transaction) -> BoxedErrorResult<()>;
    async fn get_ko(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>>;

    /// Store a keychain link, making it the head of its address if it is
    /// the most recent one
    async fn store_keychain(&self, keychain: Keychain) -> BoxedErrorResult<()>;
    async fn get_keychain(&self, hash: TxHash) -> BoxedErrorResult<Option<LedgerRecord>>;
    async fn get_last_keychain(&self, address: TxAddress)
    -> BoxedErrorResult<Option<LedgerRecord>>;

    async fn store_id(&self, id: Id) -> BoxedErrorResult<()>;
    async fn get_id(&self, hash: TxHash) -> BoxedErrorResult<Option<Transaction>>;
    async fn get_id_by_address(&self, address: TxAddress)
    -> BoxedErrorResult<Option<Transaction>>;
}

pub type LedgerRepositoryRef = Arc<dyn LedgerRepository + Send + Sync + 'static>;
