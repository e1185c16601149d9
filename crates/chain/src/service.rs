use std::collections::BTreeSet;
use std::fmt;

use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use tracing::{debug, info, instrument, warn};
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::keys::Pubkey;
use uniledger_core::projection::{Id, Keychain, ProjectionError};
use uniledger_core::transaction::{
    ChainError, InvalidTransactionError, Transaction, TransactionType,
};
use uniledger_core::validation::{InvalidValidationError, MasterValidationError};
use uniledger_util_error::{BoxedError, BoxedErrorResult};

use crate::LOG_TARGET;
use crate::repository::LedgerRepositoryRef;

#[derive(Debug, Snafu)]
pub enum StorageError {
    #[snafu(display("Transaction was not mined"))]
    NotMined,
    #[snafu(display("Coordinator {} is not authorized", coordinator.to_short()))]
    Unauthorized { coordinator: Pubkey },
    #[snafu(display("Invalid transaction"))]
    InvalidTransaction { source: InvalidTransactionError },
    #[snafu(display("Not enough confirmations: required {required}, got {actual}"))]
    NotEnoughConfirmations { required: usize, actual: usize },
    #[snafu(display("Invalid master validation"))]
    InvalidMasterValidation { source: MasterValidationError },
    #[snafu(display("Invalid confirmation #{idx}"))]
    InvalidConfirmation {
        idx: usize,
        source: InvalidValidationError,
    },
    #[snafu(display("Transaction does not extend its chain"))]
    Chain { source: ChainError },
    #[snafu(display("Transaction does not project to its type"))]
    Projection { source: ProjectionError },
    #[snafu(display("Ledger repository error"))]
    Repository { source: BoxedError },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Where [`ChainService::store_transaction`] put a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOutcome {
    Ko,
    Keychain,
    Id,
    /// Contract transactions are accepted but not stored
    Skipped,
    AlreadyStored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Unknown,
    Pending,
    Success,
    Failure,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Unknown => "unknown",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failure => "failure",
        })
    }
}

/// Routes mined transactions to their store
pub struct ChainService {
    repo: LedgerRepositoryRef,
    min_confirmations: usize,
    /// Coordinators allowed to submit mined transactions, `None` for any
    authorized: Option<BTreeSet<Pubkey>>,
}

#[bon::bon]
impl ChainService {
    #[builder]
    pub fn new(
        repo: LedgerRepositoryRef,
        #[builder(default = 1)] min_confirmations: usize,
        authorized: Option<BTreeSet<Pubkey>>,
    ) -> Self {
        Self {
            repo,
            min_confirmations,
            authorized,
        }
    }
}

impl ChainService {
    pub fn repo(&self) -> &LedgerRepositoryRef {
        &self.repo
    }

    /// Everything a mined transaction must pass before it is stored,
    /// KO or not
    pub fn check_transaction_before_storage(&self, tx: &Transaction) -> StorageResult<()> {
        let master = tx.master_validation().context(NotMinedSnafu)?;

        if let Some(authorized) = self.authorized.as_ref() {
            ensure!(
                authorized.contains(&master.coordinator()),
                UnauthorizedSnafu {
                    coordinator: master.coordinator()
                }
            );
        }

        tx.is_valid().context(InvalidTransactionSnafu)?;

        ensure!(
            self.min_confirmations <= tx.confirmations().len(),
            NotEnoughConfirmationsSnafu {
                required: self.min_confirmations,
                actual: tx.confirmations().len(),
            }
        );

        tx.check_master_validation()
            .context(InvalidMasterValidationSnafu)?;

        tx.check_confirmations()
            .map_err(|(idx, source)| StorageError::InvalidConfirmation { idx, source })?;

        Ok(())
    }

    /// Store a mined transaction, in the KO store if anyone rejected it
    ///
    /// Keychain transactions are chained onto the current head of their
    /// address first. Storing the same transaction again is a no-op.
    #[instrument(
        target = LOG_TARGET,
        name = "store",
        level = "debug",
        skip_all,
        fields(tx_hash = %tx.hash)
    )]
    pub async fn store_transaction(&self, mut tx: Transaction) -> StorageResult<StorageOutcome> {
        self.check_transaction_before_storage(&tx)?;

        let hash = tx.hash;
        if matches!(
            self.get_transaction_status(hash).await?,
            TransactionStatus::Success | TransactionStatus::Failure
        ) {
            debug!(target: LOG_TARGET, "Transaction already stored");
            return Ok(StorageOutcome::AlreadyStored);
        }

        let outcome = if tx.is_ko() {
            self.repo.store_ko(tx).await.context(RepositorySnafu)?;
            StorageOutcome::Ko
        } else {
            match tx.tx_type() {
                TransactionType::Keychain => {
                    let head = self
                        .get_last_transaction(tx.address(), TransactionType::Keychain)
                        .await?;
                    tx.chain(head).context(ChainSnafu)?;
                    let keychain = Keychain::try_from(tx).context(ProjectionSnafu)?;
                    self.repo
                        .store_keychain(keychain)
                        .await
                        .context(RepositorySnafu)?;
                    StorageOutcome::Keychain
                }
                TransactionType::Id => {
                    let id = Id::try_from(tx).context(ProjectionSnafu)?;
                    self.repo.store_id(id).await.context(RepositorySnafu)?;
                    StorageOutcome::Id
                }
                TransactionType::Contract | TransactionType::ContractMessage => {
                    warn!(
                        target: LOG_TARGET,
                        tx_type = %tx.tx_type(),
                        "Contract transactions are not stored"
                    );
                    StorageOutcome::Skipped
                }
            }
        };

        self.repo
            .remove_pending(hash)
            .await
            .context(RepositorySnafu)?;
        info!(target: LOG_TARGET, ?outcome, "Stored transaction");
        Ok(outcome)
    }

    /// Look the transaction up in order: pending, KO, keychain, id
    pub async fn get_transaction_status(&self, hash: TxHash) -> StorageResult<TransactionStatus> {
        self.get_transaction_status_inner(hash)
            .await
            .context(RepositorySnafu)
    }

    async fn get_transaction_status_inner(
        &self,
        hash: TxHash,
    ) -> BoxedErrorResult<TransactionStatus> {
        if self.repo.get_pending(hash).await?.is_some() {
            return Ok(TransactionStatus::Pending);
        }
        if self.repo.get_ko(hash).await?.is_some() {
            return Ok(TransactionStatus::Failure);
        }
        if self.repo.get_keychain(hash).await?.is_some() {
            return Ok(TransactionStatus::Success);
        }
        if self.repo.get_id(hash).await?.is_some() {
            return Ok(TransactionStatus::Success);
        }
        Ok(TransactionStatus::Unknown)
    }

    /// Find a stored transaction by hash, in any of the final stores
    ///
    /// Keychain transactions are returned without their ancestors.
    pub async fn get_transaction(&self, hash: TxHash) -> StorageResult<Option<Transaction>> {
        let repo = &self.repo;
        if let Some(tx) = repo.get_ko(hash).await.context(RepositorySnafu)? {
            return Ok(Some(tx));
        }
        if let Some(record) = repo.get_keychain(hash).await.context(RepositorySnafu)? {
            return Ok(Some(record.transaction));
        }
        repo.get_id(hash).await.context(RepositorySnafu)
    }

    /// Most recent transaction of `address`
    ///
    /// For keychains this is the chain head, with all its ancestors linked.
    /// Contract types have no stored transactions.
    pub async fn get_last_transaction(
        &self,
        address: TxAddress,
        tx_type: TransactionType,
    ) -> StorageResult<Option<Transaction>> {
        match tx_type {
            TransactionType::Keychain => self.get_keychain_chain(address).await,
            TransactionType::Id => self
                .repo
                .get_id_by_address(address)
                .await
                .context(RepositorySnafu),
            TransactionType::Contract | TransactionType::ContractMessage => Ok(None),
        }
    }

    async fn get_keychain_chain(&self, address: TxAddress) -> StorageResult<Option<Transaction>> {
        let Some(head) = self
            .repo
            .get_last_keychain(address)
            .await
            .context(RepositorySnafu)?
        else {
            return Ok(None);
        };

        // Newest first
        let mut links = vec![];
        let mut previous_hash = head.previous_hash;
        links.push(head.transaction);
        while let Some(hash) = previous_hash {
            let Some(record) = self
                .repo
                .get_keychain(hash)
                .await
                .context(RepositorySnafu)?
            else {
                warn!(target: LOG_TARGET, %address, %hash, "Missing keychain ancestor");
                break;
            };
            previous_hash = record.previous_hash;
            links.push(record.transaction);
        }

        let mut chain = links.pop();
        while let Some(mut next) = links.pop() {
            if let Some(previous) = chain.take() {
                next.link_previous_unchecked(previous);
            }
            chain = Some(next);
        }
        Ok(chain)
    }
}
