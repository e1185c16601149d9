use std::sync::Arc;
use std::time::Duration;

use backon::Retryable as _;
use futures::StreamExt as _;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use n0_future::task::AbortOnDropHandle;
use snafu::{ResultExt as _, Snafu, ensure};
use tracing::{debug, info, instrument, trace, warn};
use uniledger_chain::StorageError;
use uniledger_core::elected::ElectedNodeList;
use uniledger_core::hash::TxHash;
use uniledger_core::keys::Pubkey;
use uniledger_core::transaction::Transaction;
use uniledger_core::validation::{MasterValidation, Validation, ValidationStatus};
use uniledger_election::{ElectionError, ElectionResult};
use uniledger_lock::{LockError, LockKey};
use uniledger_util_error::BoxedError;
use uniledger_util_error::fmt::FmtCompact as _;

use crate::msg::{ConfirmationRequest, LockRequest, ReleaseRequest, ReplicationRequest};
use crate::peer::PeerError;
use crate::{LOG_TARGET, MiningOutcome, MiningState, Node, RPC_BACKOFF};

#[derive(Debug, Snafu)]
pub enum LeadMiningError {
    #[snafu(display("Transaction is already mined"))]
    AlreadyMined,
    #[snafu(display("Malformed transaction address"))]
    MalformedAddress,
    #[snafu(display("Failed to read the chain head"))]
    ChainHead { source: StorageError },
    #[snafu(display("Failed to elect the storage pool"))]
    StoragePool { source: ElectionError },
    #[snafu(display("Failed to lock the transaction"))]
    Lock { source: LockError },
    #[snafu(display("Storage node {} refused the lock", peer.to_short()))]
    PeerLock { peer: Pubkey, source: PeerError },
    #[snafu(display("Failed to mark the transaction as pending"))]
    Pending { source: BoxedError },
}

pub type LeadMiningResult<T> = Result<T, LeadMiningError>;

impl Node {
    /// Start mining `tx`, with this node as the coordinator
    ///
    /// Returns once the transaction is locked on this node and on every
    /// reachable storage node. Whatever happens next is only published
    /// through [`Node::subscribe_mining_states`].
    #[instrument(
        target = LOG_TARGET,
        name = "lead",
        level = "debug",
        skip_all,
        fields(tx_hash = %tx.hash)
    )]
    pub async fn lead_mining(
        self: &Arc<Self>,
        tx: Transaction,
        min_validations: usize,
    ) -> LeadMiningResult<()> {
        ensure!(!tx.is_mined(), AlreadyMinedSnafu);
        ensure!(tx.address().is_well_formed(), MalformedAddressSnafu);

        let previous_miners = self
            .chain
            .get_last_transaction(tx.address(), tx.tx_type())
            .await
            .context(ChainHeadSnafu)?
            .map(|head| head.miners())
            .unwrap_or_default();

        let storage_pool = self
            .election
            .find_storage_pool(&*self.topology)
            .context(StoragePoolSnafu)?;

        let key = LockKey::new(tx.hash, tx.address());
        self.lock_network(key, &storage_pool).await?;

        if let Err(source) = self.chain.repo().store_pending(tx.clone()).await {
            self.release_network(key, &storage_pool).await;
            return Err(LeadMiningError::Pending { source });
        }
        self.set_mining_state(tx.hash, MiningState::Locked);

        let tx_hash = tx.hash;
        let task = AbortOnDropHandle::new(tokio::spawn(self.clone().continue_mining(
            tx,
            min_validations,
            previous_miners,
            storage_pool,
        )));

        let mut tasks = self.mining_tasks.lock().expect("Locking failed");
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(tx_hash, task);
        Ok(())
    }

    /// Elect the coordinators of `tx_hash`, among the authorized nodes
    pub fn find_coordinator_pool(&self, tx_hash: TxHash) -> ElectionResult<ElectedNodeList> {
        self.election
            .find_coordinator_pool(tx_hash, &self.candidates(), &*self.topology)
    }

    /// Nodes allowed to take part in mining
    fn candidates(&self) -> Vec<Pubkey> {
        match self.shared_keys.authorized_nodes() {
            Some(authorized) => authorized.into_iter().collect(),
            None => self
                .topology
                .nodes()
                .into_iter()
                .map(|node| node.pubkey)
                .collect(),
        }
    }

    fn remote_storage_nodes(&self, storage_pool: &ElectedNodeList) -> Vec<Pubkey> {
        storage_pool
            .nodes
            .0
            .iter()
            .filter(|node| !node.is_unreachable && node.pubkey != self.pubkey())
            .map(|node| node.pubkey)
            .collect()
    }

    /// Take the lease on `key` here and on the storage pool, or nowhere
    async fn lock_network(
        &self,
        key: LockKey,
        storage_pool: &ElectedNodeList,
    ) -> LeadMiningResult<()> {
        let owner = self.pubkey();
        self.locks
            .acquire(key, owner, self.config.lock_ttl)
            .await
            .context(LockSnafu)?;

        let req = LockRequest::new(key, owner, self.config.lock_ttl);
        let peers = self.remote_storage_nodes(storage_pool);
        let responses =
            join_all(peers.iter().map(|peer| self.peers.request_lock(*peer, req))).await;

        let mut locked = vec![];
        let mut refusals = vec![];
        for (peer, res) in peers.into_iter().zip(responses) {
            match res {
                Ok(()) => locked.push(peer),
                Err(err) => refusals.push((peer, err)),
            }
        }

        let Some((peer, source)) = refusals.into_iter().next() else {
            debug!(target: LOG_TARGET, %key, num = locked.len(), "Locked on storage pool");
            return Ok(());
        };

        debug!(
            target: LOG_TARGET,
            %key,
            peer = %peer.to_short(),
            err = %source.fmt_compact(),
            "Lock refused, rolling back"
        );
        self.release_peers(key, &locked).await;
        if let Err(err) = self.locks.release(key).await {
            warn!(target: LOG_TARGET, %key, err = %err.fmt_compact(), "Failed to release own lock");
        }
        Err(LeadMiningError::PeerLock { peer, source })
    }

    async fn release_network(&self, key: LockKey, storage_pool: &ElectedNodeList) {
        if let Err(err) = self.locks.release(key).await {
            warn!(target: LOG_TARGET, %key, err = %err.fmt_compact(), "Failed to release own lock");
        }
        self.release_peers(key, &self.remote_storage_nodes(storage_pool))
            .await;
    }

    async fn release_peers(&self, key: LockKey, peers: &[Pubkey]) {
        let req = ReleaseRequest { key };
        let responses =
            join_all(peers.iter().map(|peer| self.peers.request_release(*peer, req))).await;
        for (peer, res) in peers.iter().zip(responses) {
            if let Err(err) = res {
                // The lease expires on its own
                debug!(
                    target: LOG_TARGET,
                    %key,
                    peer = %peer.to_short(),
                    err = %err.fmt_compact(),
                    "Failed to release lock"
                );
            }
        }
    }

    #[instrument(
        target = LOG_TARGET,
        name = "mine",
        level = "info",
        skip_all,
        fields(tx_hash = %tx.hash)
    )]
    async fn continue_mining(
        self: Arc<Self>,
        tx: Transaction,
        min_validations: usize,
        previous_miners: Vec<Pubkey>,
        storage_pool: ElectedNodeList,
    ) {
        let tx_hash = tx.hash;
        let key = LockKey::new(tx.hash, tx.address());

        let outcome = self
            .mine(tx, min_validations, previous_miners, &storage_pool)
            .await;

        self.release_network(key, &storage_pool).await;
        if let Err(err) = self.chain.repo().remove_pending(tx_hash).await {
            warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to remove pending transaction");
        }

        info!(target: LOG_TARGET, %outcome, "Mining finished");
        self.set_mining_state(tx_hash, MiningState::Released(outcome));
    }

    async fn mine(
        &self,
        mut tx: Transaction,
        min_validations: usize,
        previous_miners: Vec<Pubkey>,
        storage_pool: &ElectedNodeList,
    ) -> MiningOutcome {
        let tx_hash = tx.hash;
        let min_validations = min_validations.max(1);

        let validator_pool = match self.election.find_validator_pool(
            tx_hash,
            min_validations,
            &self.candidates(),
            &*self.topology,
        ) {
            Ok(pool) => pool,
            Err(err) => {
                warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to elect validators");
                return MiningOutcome::ElectionFailed;
            }
        };

        let master_validation = self.pre_validate(&tx, previous_miners);
        self.set_mining_state(
            tx_hash,
            MiningState::PreValidated(master_validation.status()),
        );

        self.set_mining_state(tx_hash, MiningState::AwaitingConfirmations);
        let Some(confirmations) = self
            .collect_confirmations(&tx, &master_validation, validator_pool, min_validations)
            .await
        else {
            warn!(target: LOG_TARGET, "Validators did not settle in time");
            return MiningOutcome::ConsensusTimeout;
        };

        let status = match attach_verdicts(&mut tx, master_validation, confirmations) {
            Ok(status) => status,
            Err(outcome) => return outcome,
        };
        self.set_mining_state(tx_hash, MiningState::Mined(status));

        match self.replicate(&tx, storage_pool).await {
            Ok(()) => {
                self.set_mining_state(tx_hash, MiningState::Stored(status));
                MiningOutcome::Stored(status)
            }
            Err(outcome) => outcome,
        }
    }

    /// Own verdict on `tx`: OK if it is valid and an emitter key signed it
    fn pre_validate(&self, tx: &Transaction, previous_miners: Vec<Pubkey>) -> MasterValidation {
        let proof_of_work = tx.find_proof_of_work(&self.shared_keys.emitter_cross_pubkeys());

        let status = match (tx.is_valid(), proof_of_work) {
            (Ok(()), Some(_)) => ValidationStatus::Ok,
            (Ok(()), None) => {
                warn!(target: LOG_TARGET, "No emitter key matches the proof of work");
                ValidationStatus::Ko
            }
            (Err(err), _) => {
                warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Pre-validation failed");
                ValidationStatus::Ko
            }
        };

        MasterValidation {
            proof_of_work,
            previous_miners,
            validation: Validation::new_sign(status, self.seckey),
        }
    }

    /// Ask every reachable validator, until one says KO or enough say OK
    ///
    /// `None` if neither happened before the deadline.
    async fn collect_confirmations(
        &self,
        tx: &Transaction,
        master_validation: &MasterValidation,
        validator_pool: ElectedNodeList,
        min_validations: usize,
    ) -> Option<Vec<Validation>> {
        let req = ConfirmationRequest {
            transaction: tx.clone(),
            master_validation: master_validation.clone(),
            validator_pool,
        };

        let mut pending: FuturesUnordered<_> = req
            .validator_pool
            .nodes
            .0
            .iter()
            .filter(|node| !node.is_unreachable)
            .map(|node| {
                let peer = node.pubkey;
                let req = req.clone();
                async move { (peer, self.peers.request_confirmation(peer, req).await) }
            })
            .collect();
        trace!(target: LOG_TARGET, num = pending.len(), "Requesting confirmations");

        let mut confirmations = vec![];
        let fan_in = async {
            while let Some((peer, res)) = pending.next().await {
                let validation = match res {
                    Ok(validation) => validation,
                    Err(err) => {
                        debug!(
                            target: LOG_TARGET,
                            peer = %peer.to_short(),
                            err = %err.fmt_compact(),
                            "Validator failed to answer"
                        );
                        continue;
                    }
                };
                if validation.node_pubkey != peer {
                    warn!(target: LOG_TARGET, peer = %peer.to_short(), "Validation signed by another node");
                    continue;
                }
                if let Err(err) = validation.check() {
                    warn!(
                        target: LOG_TARGET,
                        peer = %peer.to_short(),
                        err = %err.fmt_compact(),
                        "Invalid validation"
                    );
                    continue;
                }

                let is_ko = validation.is_ko();
                confirmations.push(validation);
                // Everything before a KO was OK
                if is_ko || min_validations <= confirmations.len() {
                    return true;
                }
            }
            false
        };

        let is_settled = tokio::time::timeout(self.config.consensus_timeout, fan_in)
            .await
            .unwrap_or(false);
        is_settled.then_some(confirmations)
    }

    /// Hand `tx` to the storage pool and wait for enough acks
    async fn replicate(
        &self,
        tx: &Transaction,
        storage_pool: &ElectedNodeList,
    ) -> Result<(), MiningOutcome> {
        let req = ReplicationRequest {
            transaction: tx.clone(),
        };

        let mut pending: FuturesUnordered<_> = storage_pool
            .nodes
            .0
            .iter()
            .filter(|node| !node.is_unreachable)
            .map(|node| {
                let peer = node.pubkey;
                let req = req.clone();
                async move {
                    let res = {
                        || {
                            let req = req.clone();
                            async move { self.peers.replicate(peer, req).await }
                        }
                    }
                    .retry(RPC_BACKOFF)
                    .when(PeerError::is_retryable)
                    .notify(|err: &PeerError, dur: Duration| {
                        debug!(
                            target: LOG_TARGET,
                            peer = %peer.to_short(),
                            dur_millis = %dur.as_millis(),
                            err = %err.fmt_compact(),
                            "Retrying replication"
                        );
                    })
                    .await;
                    (peer, res)
                }
            })
            .collect();

        let required = self.config.min_replicas;
        let mut acks = 0;
        let fan_in = async {
            let mut is_rejected = false;
            while let Some((peer, res)) = pending.next().await {
                match res {
                    Ok(()) => {
                        acks += 1;
                        if required <= acks {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        is_rejected = true;
                        warn!(
                            target: LOG_TARGET,
                            peer = %peer.to_short(),
                            err = %err.fmt_compact(),
                            "Storage node refused the transaction"
                        );
                    }
                }
            }
            Err(if is_rejected {
                MiningOutcome::StorageRejected
            } else {
                MiningOutcome::ReplicationTimeout
            })
        };

        let res = tokio::time::timeout(self.config.replication_timeout, fan_in).await;
        match res {
            Ok(res) => res,
            Err(_) => {
                warn!(target: LOG_TARGET, acks, required, "Replication timed out");
                Err(MiningOutcome::ReplicationTimeout)
            }
        }
    }
}

/// Attach the collected verdicts to `tx`, returning the consensus
pub(crate) fn attach_verdicts(
    tx: &mut Transaction,
    master_validation: MasterValidation,
    confirmations: Vec<Validation>,
) -> Result<ValidationStatus, MiningOutcome> {
    if let Err(err) = tx.attach_mining_result(master_validation, confirmations) {
        warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to attach verdicts");
        return Err(MiningOutcome::AttachFailed);
    }
    Ok(if tx.is_ko() {
        ValidationStatus::Ko
    } else {
        ValidationStatus::Ok
    })
}
