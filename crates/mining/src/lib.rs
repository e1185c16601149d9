// SPDX-License-Identifier: MIT

//! Mining orchestration
//!
//! A [`Node`] plays every role of the mining workflow. As a coordinator it
//! leads the mining of a transaction ([`Node::lead_mining`]): it locks the
//! transaction across the storage pool, elects validators, collects their
//! verdicts and hands the mined transaction to storage. As a validator or a
//! storage node it answers the requests of other coordinators, through the
//! `handle_*` methods.
//!
//! Leading returns as soon as the transaction is locked. The rest of the
//! attempt runs in a background task whose progress is published as a
//! [`MiningState`] per transaction.

mod config;
mod handlers;
mod lead;
mod local;
pub mod msg;
mod peer;
mod state;
#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use backon::FibonacciBuilder;
pub use config::MiningConfig;
pub use handlers::ConfirmationError;
pub use lead::LeadMiningError;
pub use local::LocalNetwork;
use n0_future::task::AbortOnDropHandle;
pub use peer::{PeerClient, PeerClientRef, PeerError, PeerResult};
pub use state::{MiningOutcome, MiningState};
use tokio::sync::watch;
use uniledger_chain::{ChainService, LedgerRepositoryRef};
use uniledger_core::hash::TxHash;
use uniledger_core::keys::{Pubkey, Seckey};
use uniledger_core::shared_keys::SharedKeysReader;
use uniledger_election::{Election, EntropySort, TopologyReader};
use uniledger_lock::LeaseLocksRef;

const LOG_TARGET: &str = "uniledger::mining";

const RPC_BACKOFF: FibonacciBuilder = FibonacciBuilder::new()
    .with_jitter()
    .without_max_times()
    .with_min_delay(Duration::from_millis(50))
    .with_max_delay(Duration::from_secs(2));

pub struct Node {
    seckey: Seckey,
    shared_keys: Arc<dyn SharedKeysReader>,
    topology: Arc<dyn TopologyReader + Send + Sync>,
    election: Election,
    locks: LeaseLocksRef,
    chain: ChainService,
    peers: PeerClientRef,
    config: MiningConfig,

    mining_states_tx: watch::Sender<BTreeMap<TxHash, MiningState>>,
    /// Background part of every attempt this node leads
    mining_tasks: std::sync::Mutex<BTreeMap<TxHash, AbortOnDropHandle<()>>>,
    /// Attempts in a `Released` state, oldest first
    finished_states: std::sync::Mutex<VecDeque<TxHash>>,
}

#[bon::bon]
impl Node {
    #[builder]
    pub fn new(
        seckey: Seckey,
        shared_keys: Arc<dyn SharedKeysReader>,
        topology: Arc<dyn TopologyReader + Send + Sync>,
        locks: LeaseLocksRef,
        repo: LedgerRepositoryRef,
        peers: PeerClientRef,
        #[builder(default)] config: MiningConfig,
        entropy: Option<Arc<dyn EntropySort + Send + Sync>>,
    ) -> Arc<Self> {
        let election = Election::builder()
            .seckey(seckey)
            .seed(shared_keys.election_seed())
            .maybe_entropy(entropy)
            .build();
        let chain = ChainService::builder()
            .repo(repo)
            .min_confirmations(config.min_confirmations)
            .maybe_authorized(shared_keys.authorized_nodes())
            .build();
        let (mining_states_tx, _) = watch::channel(BTreeMap::new());

        Arc::new(Self {
            seckey,
            shared_keys,
            topology,
            election,
            locks,
            chain,
            peers,
            config,
            mining_states_tx,
            mining_tasks: std::sync::Mutex::new(BTreeMap::new()),
            finished_states: std::sync::Mutex::new(VecDeque::new()),
        })
    }
}

impl Node {
    pub fn pubkey(&self) -> Pubkey {
        self.seckey.pubkey()
    }

    pub fn chain(&self) -> &ChainService {
        &self.chain
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    pub fn subscribe_mining_states(&self) -> watch::Receiver<BTreeMap<TxHash, MiningState>> {
        self.mining_states_tx.subscribe()
    }

    pub fn mining_state(&self, tx_hash: TxHash) -> Option<MiningState> {
        self.mining_states_tx.borrow().get(&tx_hash).copied()
    }

    /// Wait until the attempt to mine `tx_hash` led by this node is over
    ///
    /// Never returns if no attempt was started, or if it finished so long
    /// ago its state was dropped (see [`MiningConfig::max_finished_states`]).
    pub async fn wait_mining_outcome(&self, tx_hash: TxHash) -> MiningOutcome {
        let mut states_rx = self.subscribe_mining_states();
        loop {
            if let Some(outcome) = states_rx
                .borrow_and_update()
                .get(&tx_hash)
                .and_then(|state| state.outcome())
            {
                return outcome;
            }
            states_rx
                .changed()
                .await
                .expect("Sender lives as long as self");
        }
    }

    fn set_mining_state(&self, tx_hash: TxHash, state: MiningState) {
        let expired = if state.outcome().is_some() {
            self.push_finished(tx_hash)
        } else {
            vec![]
        };

        self.mining_states_tx.send_modify(|states| {
            states.insert(tx_hash, state);
            for hash in &expired {
                // Might have been started again since
                if states.get(hash).is_some_and(|state| state.outcome().is_some()) {
                    states.remove(hash);
                }
            }
        });
    }

    /// Record `tx_hash` as finished, returning the ones that fell out of the window
    fn push_finished(&self, tx_hash: TxHash) -> Vec<TxHash> {
        let mut finished = self.finished_states.lock().expect("Locking failed");
        finished.retain(|hash| *hash != tx_hash);
        finished.push_back(tx_hash);

        let excess = finished
            .len()
            .saturating_sub(self.config.max_finished_states.max(1));
        finished.drain(..excess).collect()
    }
}
