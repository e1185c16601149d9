use std::path::{Path, PathBuf};
use std::sync::Arc;

use snafu::{OptionExt as _, ResultExt as _, ensure_whatever};
use tracing::{info, warn};
use uniledger_chain::{LedgerRepositoryRef, MemLedger, RedbLedger, TransactionStatus};
use uniledger_core::geo_patch::compute_patch;
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::keys::Seckey;
use uniledger_core::projection::KEYCHAIN_FIELDS;
use uniledger_core::shared_keys::SharedKeys;
use uniledger_core::transaction::{Proposal, Transaction, TransactionContent, TransactionType};
use uniledger_db::Database;
use uniledger_lock::{LeaseLocksRef, LockManager, RedbLockStore};
use uniledger_core::validation::ValidationStatus;
use uniledger_mining::{LocalNetwork, MiningConfig, MiningOutcome, Node};
use uniledger_util_error::WhateverResult;
use uniledger_util_error::fmt::FmtCompact as _;

const LOG_TARGET: &str = "uniledger::devnet";

/// Nodes of an in-process network, all sharing one emitter key
pub(crate) struct Devnet {
    nodes: Vec<Arc<Node>>,
    emitter: Seckey,
}

#[bon::bon]
impl Devnet {
    #[builder]
    pub async fn new(
        num_nodes: u16,
        #[builder(default)] num_unreachable: u16,
        data_dir: Option<PathBuf>,
        #[builder(default)] mining_config: MiningConfig,
    ) -> WhateverResult<Self> {
        ensure_whatever!(
            num_unreachable < num_nodes,
            "At least one node must stay reachable"
        );
        if let Some(data_dir) = data_dir.as_ref() {
            tokio::fs::create_dir_all(data_dir)
                .await
                .whatever_context("Failed to create data dir")?;
        }

        let network = LocalNetwork::new();
        let emitter = Seckey::generate();
        let shared_keys = Arc::new(
            SharedKeys::builder()
                .emitter_cross_pubkeys(vec![emitter.pubkey()])
                .node_cross_seckey(Seckey::generate())
                .build(),
        );

        let mut nodes = vec![];
        for idx in 0..num_nodes {
            let (locks, repo) = open_storage(data_dir.as_deref(), idx).await?;
            let node = Node::builder()
                .seckey(Seckey::generate())
                .shared_keys(shared_keys.clone())
                .topology(network.clone())
                .locks(locks)
                .repo(repo)
                .peers(network.clone())
                .config(mining_config)
                .build();

            let (lat, lon) = node_coordinates(idx);
            let patch = compute_patch(lat, lon).whatever_context("Node outside of the grid")?;
            network.register(&node, patch);
            info!(
                target: LOG_TARGET,
                idx,
                pubkey = %node.pubkey().to_short(),
                %patch,
                "Started node"
            );
            nodes.push(node);
        }

        for node in nodes.iter().rev().take(num_unreachable.into()) {
            network.set_reachable(node.pubkey(), false);
            info!(target: LOG_TARGET, pubkey = %node.pubkey().to_short(), "Node cut off");
        }

        Ok(Self { nodes, emitter })
    }
}

impl Devnet {
    /// Mine `num_transactions` links of one keychain, one after another
    ///
    /// Returns the number of links stored as valid.
    pub async fn run(
        &self,
        num_transactions: usize,
        min_validations: usize,
    ) -> WhateverResult<usize> {
        let owner = Seckey::generate();
        let address = TxAddress::from_pubkey(owner.pubkey());
        let mut num_stored = 0;

        for _ in 0..num_transactions {
            let tx = self.keychain_tx(owner);
            let tx_hash = tx.hash;
            let coordinator = self.coordinator(tx_hash)?;

            if let Err(err) = coordinator.lead_mining(tx, min_validations).await {
                warn!(target: LOG_TARGET, %tx_hash, err = %err.fmt_compact(), "Failed to start mining");
                continue;
            }
            let outcome = coordinator.wait_mining_outcome(tx_hash).await;
            if outcome == MiningOutcome::Stored(ValidationStatus::Ok) {
                num_stored += 1;
            }

            let mut num_success = 0;
            for node in &self.nodes {
                if node
                    .chain()
                    .get_transaction_status(tx_hash)
                    .await
                    .whatever_context("Failed to query transaction status")?
                    == TransactionStatus::Success
                {
                    num_success += 1;
                }
            }
            println!(
                "{tx_hash}: {outcome}, coordinated by {}, successful on {num_success}/{} nodes",
                coordinator.pubkey().to_short(),
                self.nodes.len()
            );
        }

        let head = self.nodes[0]
            .chain()
            .get_last_transaction(address, TransactionType::Keychain)
            .await
            .whatever_context("Failed to query chain head")?;
        match head {
            Some(head) => println!("{address}: head {}", head.hash),
            None => println!("{address}: empty"),
        }
        Ok(num_stored)
    }

    /// First reachable node of the coordinator pool of `tx_hash`
    fn coordinator(&self, tx_hash: TxHash) -> WhateverResult<&Arc<Node>> {
        let pool = self.nodes[0]
            .find_coordinator_pool(tx_hash)
            .whatever_context("Failed to elect coordinators")?;

        pool.nodes
            .0
            .iter()
            .filter(|elected| !elected.is_unreachable)
            .find_map(|elected| {
                self.nodes
                    .iter()
                    .find(|node| node.pubkey() == elected.pubkey)
            })
            .whatever_context("No reachable coordinator")
    }

    fn keychain_tx(&self, owner: Seckey) -> Transaction {
        let data = KEYCHAIN_FIELDS
            .iter()
            .map(|field| ((*field).to_owned(), random_ciphertext()))
            .collect();
        let content = TransactionContent::builder()
            .address(TxAddress::from_pubkey(owner.pubkey()))
            .tx_type(TransactionType::Keychain)
            .data(data)
            .public_key(owner.pubkey())
            .proposal(Proposal {
                shared_pubkey: Seckey::generate().pubkey(),
                encrypted_shared_seckey: rand::random::<[u8; 32]>().to_vec(),
            })
            .build();
        Transaction::new_signed(content, owner, self.emitter)
    }
}

async fn open_storage(
    data_dir: Option<&Path>,
    idx: u16,
) -> WhateverResult<(LeaseLocksRef, LedgerRepositoryRef)> {
    let Some(data_dir) = data_dir else {
        let locks: LeaseLocksRef = Arc::new(LockManager::new());
        let ledger: LedgerRepositoryRef = Arc::new(MemLedger::new());
        return Ok((locks, ledger));
    };

    let db = Arc::new(
        Database::open(data_dir.join(format!("node-{idx}.redb")))
            .await
            .whatever_context("Failed to open database")?,
    );
    let locks = RedbLockStore::open(db.clone())
        .await
        .whatever_context("Failed to open lock store")?;
    let ledger = RedbLedger::open(db)
        .await
        .whatever_context("Failed to open ledger")?;
    Ok((Arc::new(locks), Arc::new(ledger)))
}

/// Spread over the globe, so nodes land in different patches
fn node_coordinates(idx: u16) -> (f64, f64) {
    let idx = f64::from(idx);
    (
        -85.0 + (idx * 47.0) % 170.0,
        -175.0 + (idx * 113.0) % 350.0,
    )
}

fn random_ciphertext() -> String {
    data_encoding::HEXLOWER.encode(&rand::random::<[u8; 32]>())
}

#[cfg(test)]
mod tests;
