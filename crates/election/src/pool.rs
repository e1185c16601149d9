use std::collections::BTreeSet;
use std::sync::Arc;

use snafu::ensure;
use tracing::debug;
use uniledger_core::elected::{
    ElectedNode, ElectedNodeList, ElectedNodes, InvalidElectedNodeListError,
};
use uniledger_core::geo_patch::required_patch_number;
use uniledger_core::hash::TxHash;
use uniledger_core::keys::{Pubkey, Seckey};

use crate::LOG_TARGET;
use crate::entropy::{Blake3EntropySort, EntropySort};
use crate::error::{
    ElectionResult, InsufficientCoordinatorsSnafu, InsufficientValidatorsSnafu,
    NoStorageNodesSnafu,
};
use crate::fee::{FeeMatrix, FeeSchedule};
use crate::required::required_coordinators;
use crate::topology::{NodeInfo, TopologyReader};

/// Elects pools on behalf of one node, signing them with its key
#[derive(Clone)]
pub struct Election {
    entropy: Arc<dyn EntropySort + Send + Sync>,
    fees: Arc<dyn FeeSchedule + Send + Sync>,
    seckey: Seckey,
    seed: [u8; 32],
}

#[bon::bon]
impl Election {
    #[builder]
    pub fn new(
        #[builder(default = default_entropy())] entropy: Arc<dyn EntropySort + Send + Sync>,
        #[builder(default = default_fees())] fees: Arc<dyn FeeSchedule + Send + Sync>,
        seckey: Seckey,
        seed: [u8; 32],
    ) -> Self {
        Self {
            entropy,
            fees,
            seckey,
            seed,
        }
    }
}

fn default_entropy() -> Arc<dyn EntropySort + Send + Sync> {
    Arc::new(Blake3EntropySort)
}

fn default_fees() -> Arc<dyn FeeSchedule + Send + Sync> {
    Arc::new(FeeMatrix::default())
}

fn elected(node: NodeInfo, is_coordinator: bool) -> ElectedNode {
    ElectedNode {
        pubkey: node.pubkey,
        is_unreachable: !node.is_reachable,
        is_coordinator,
        patch: node.patch,
        is_healthy: node.is_healthy,
    }
}

impl Election {
    pub fn pubkey(&self) -> Pubkey {
        self.seckey.pubkey()
    }

    fn sign(&self, nodes: Vec<ElectedNode>) -> ElectedNodeList {
        ElectedNodeList::new_sign(ElectedNodes(nodes), self.seckey)
    }

    /// Validators an ordinary transaction paying `fee` needs
    pub fn required_validators_for_fee(&self, fee: u64, nb_reachable: usize) -> usize {
        self.fees.validators_for_fee(fee).min(nb_reachable)
    }

    /// Elect the coordinators of `tx_hash` among `authorized`
    ///
    /// Keys unknown to the topology are skipped. Unreachable nodes are kept
    /// in the list but don't count towards the required number.
    pub fn find_coordinator_pool(
        &self,
        tx_hash: TxHash,
        authorized: &[Pubkey],
        topology: &dyn TopologyReader,
    ) -> ElectionResult<ElectedNodeList> {
        let required = required_coordinators(authorized.len(), topology.count_reachable());

        let mut nodes = vec![];
        let mut reachable = 0;
        for pubkey in self.entropy.sort(tx_hash, authorized, &self.seed) {
            if required <= reachable {
                break;
            }
            let Some(node) = topology.find_by_pubkey(pubkey) else {
                continue;
            };
            if node.is_reachable {
                reachable += 1;
            }
            nodes.push(elected(node, true));
        }

        ensure!(
            required <= reachable,
            InsufficientCoordinatorsSnafu {
                required,
                found: reachable,
            }
        );

        debug!(target: LOG_TARGET, %tx_hash, num = nodes.len(), "Elected coordinator pool");
        Ok(self.sign(nodes))
    }

    /// Elect the validators of `tx_hash` among `candidates`
    ///
    /// Over-provisions by half of `required` and keeps going until the pool
    /// spans as many patches as the reachable network allows, up to
    /// `required`.
    pub fn find_validator_pool(
        &self,
        tx_hash: TxHash,
        required: usize,
        candidates: &[Pubkey],
        topology: &dyn TopologyReader,
    ) -> ElectionResult<ElectedNodeList> {
        let required_patches = required_patch_number(
            required,
            topology.reachable_nodes().into_iter().map(|node| node.patch),
        );
        let max_validators = required + required / 2;

        let mut nodes = vec![];
        let mut reachable = 0;
        let mut patches = BTreeSet::new();
        let is_complete = |reachable: usize, patches: &BTreeSet<_>| {
            max_validators <= reachable && required_patches <= patches.len()
        };

        for pubkey in self.entropy.sort(tx_hash, candidates, &self.seed) {
            if is_complete(reachable, &patches) {
                break;
            }
            let Some(node) = topology.find_by_pubkey(pubkey) else {
                continue;
            };
            if node.is_reachable {
                reachable += 1;
                patches.insert(node.patch);
            }
            nodes.push(elected(node, false));
        }

        ensure!(
            is_complete(reachable, &patches),
            InsufficientValidatorsSnafu {
                required: max_validators,
                required_patches,
                reachable,
                patches: patches.len(),
            }
        );

        debug!(
            target: LOG_TARGET,
            %tx_hash,
            num = nodes.len(),
            reachable,
            patches = patches.len(),
            "Elected validator pool"
        );
        Ok(self.sign(nodes))
    }

    /// Elect every reachable node as storage
    ///
    /// No entropy sort is applied, so every node stores every transaction.
    pub fn find_storage_pool(
        &self,
        topology: &dyn TopologyReader,
    ) -> ElectionResult<ElectedNodeList> {
        let nodes: Vec<_> = topology
            .reachable_nodes()
            .into_iter()
            .map(|node| elected(node, false))
            .collect();
        ensure!(!nodes.is_empty(), NoStorageNodesSnafu);

        Ok(self.sign(nodes))
    }
}

/// Check that `list` was signed by its creator, as-is
pub fn verify_elected_list(list: &ElectedNodeList) -> Result<(), InvalidElectedNodeListError> {
    list.verify()
}
