use snafu::{ResultExt as _, Snafu, ensure};
use tracing::{debug, instrument};
use uniledger_chain::{StorageError, StorageOutcome};
use uniledger_core::elected::InvalidElectedNodeListError;
use uniledger_core::keys::Pubkey;
use uniledger_core::validation::{Validation, ValidationStatus};
use uniledger_election::verify_elected_list;
use uniledger_lock::LockResult;
use uniledger_util_error::fmt::FmtCompact as _;

use crate::msg::{ConfirmationRequest, LockRequest, ReleaseRequest, ReplicationRequest};
use crate::{LOG_TARGET, Node};

/// Why a validator refused to give any verdict
#[derive(Debug, Snafu)]
pub enum ConfirmationError {
    #[snafu(display("Invalid validator pool descriptor"))]
    InvalidPool { source: InvalidElectedNodeListError },
    #[snafu(display("Validator pool was not elected by coordinator {}", coordinator.to_short()))]
    ForeignPool { coordinator: Pubkey },
    #[snafu(display("Not elected as a validator"))]
    NotElected,
}

impl Node {
    /// Give this node's verdict on a transaction, as a validator
    ///
    /// Requests that don't come with a pool electing this node, signed by
    /// the coordinator, get no verdict at all. Otherwise the answer is KO
    /// if the transaction or the master validation doesn't check out.
    #[instrument(
        target = LOG_TARGET,
        name = "confirm",
        level = "debug",
        skip_all,
        fields(tx_hash = %req.transaction.hash)
    )]
    pub fn handle_confirmation(
        &self,
        req: ConfirmationRequest,
    ) -> Result<Validation, ConfirmationError> {
        let ConfirmationRequest {
            transaction,
            master_validation,
            validator_pool,
        } = req;

        verify_elected_list(&validator_pool).context(InvalidPoolSnafu)?;
        let coordinator = master_validation.coordinator();
        ensure!(
            validator_pool.creator_pubkey == coordinator,
            ForeignPoolSnafu { coordinator }
        );
        ensure!(
            validator_pool.nodes.contains(self.pubkey()),
            NotElectedSnafu
        );

        let status = if let Err(err) = transaction.is_valid() {
            debug!(target: LOG_TARGET, err = %err.fmt_compact(), "Invalid transaction");
            ValidationStatus::Ko
        } else if let Err(err) = transaction.verify_master_validation(&master_validation) {
            debug!(target: LOG_TARGET, err = %err.fmt_compact(), "Invalid master validation");
            ValidationStatus::Ko
        } else {
            ValidationStatus::Ok
        };

        Ok(Validation::new_sign(status, self.seckey))
    }

    /// Store a mined transaction, as a member of the storage pool
    pub async fn handle_replication(
        &self,
        req: ReplicationRequest,
    ) -> Result<StorageOutcome, StorageError> {
        self.chain.store_transaction(req.transaction).await
    }

    pub async fn handle_lock(&self, req: LockRequest) -> LockResult<()> {
        self.locks.acquire(req.key, req.owner, req.ttl()).await
    }

    pub async fn handle_release(&self, req: ReleaseRequest) -> LockResult<()> {
        self.locks.release(req.key).await
    }
}
