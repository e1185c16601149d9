use std::sync::Arc;
use std::time::Duration;

use uniledger_chain::MemLedger;
use uniledger_core::elected::{ElectedNode, ElectedNodeList, ElectedNodes};
use uniledger_core::geo_patch::PatchId;
use uniledger_core::hash::TxAddress;
use uniledger_core::keys::Seckey;
use uniledger_core::shared_keys::SharedKeys;
use uniledger_core::timestamp::Timestamp;
use uniledger_core::transaction::{Transaction, TransactionType};
use uniledger_core::validation::{MasterValidation, Validation, ValidationStatus};
use uniledger_election::TopologyReader as _;
use uniledger_lock::{LockKey, LockManager};
use uniledger_util_error::BoxedErrorResult;

use crate::msg::{ConfirmationRequest, LockRequest};
use crate::lead::attach_verdicts;
use crate::{
    ConfirmationError, LeadMiningError, LocalNetwork, MiningConfig, MiningOutcome, MiningState,
    Node, PeerClient as _, PeerError,
};

struct Setup {
    network: Arc<LocalNetwork>,
    nodes: Vec<Arc<Node>>,
    emitter: Seckey,
}

impl Setup {
    fn new(num: u16) -> Self {
        Self::with_config(num, MiningConfig::default())
    }

    fn with_config(num: u16, config: MiningConfig) -> Self {
        let network = LocalNetwork::new();
        let emitter = Seckey::generate();
        let shared_keys = Arc::new(
            SharedKeys::builder()
                .emitter_cross_pubkeys(vec![emitter.pubkey()])
                .node_cross_seckey(Seckey::generate())
                .build(),
        );

        let nodes = (0..num)
            .map(|patch| {
                let node = Node::builder()
                    .seckey(Seckey::generate())
                    .shared_keys(shared_keys.clone())
                    .topology(network.clone())
                    .locks(Arc::new(LockManager::new()))
                    .repo(Arc::new(MemLedger::new()))
                    .peers(network.clone())
                    .config(config)
                    .build();
                network.register(&node, PatchId::new(patch));
                node
            })
            .collect();

        Self {
            network,
            nodes,
            emitter,
        }
    }

    fn tx(&self) -> Transaction {
        Transaction::new_test_dummy(
            TransactionType::Keychain,
            Timestamp::now(),
            Seckey::generate(),
            self.emitter,
        )
    }

    fn node(&self, idx: usize) -> &Arc<Node> {
        &self.nodes[idx]
    }
}

fn elected(node: &Node) -> ElectedNode {
    ElectedNode {
        pubkey: node.pubkey(),
        is_unreachable: false,
        is_coordinator: false,
        patch: PatchId::new(0),
        is_healthy: true,
    }
}

#[test]
fn mining_config_defaults() {
    let config = MiningConfig::default();
    assert_eq!(config.lock_ttl, Duration::from_secs(60));
    assert_eq!(config.consensus_timeout, Duration::from_secs(10));
    assert_eq!(config.replication_timeout, Duration::from_secs(10));
    assert_eq!(config.min_replicas, 1);
    assert_eq!(config.min_confirmations, 1);
    assert_eq!(config.max_finished_states, 1024);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn refused_lock_is_rolled_back_everywhere() -> BoxedErrorResult<()> {
    let setup = Setup::new(3);
    let tx = setup.tx();
    let key = LockKey::new(tx.hash, tx.address());

    // Someone else is already mining it, as far as the last node knows
    setup
        .node(2)
        .locks
        .acquire(key, Seckey::generate().pubkey(), Duration::from_secs(60))
        .await?;

    let res = setup.node(0).lead_mining(tx.clone(), 1).await;
    assert!(matches!(
        res,
        Err(LeadMiningError::PeerLock { peer, .. }) if peer == setup.node(2).pubkey()
    ));

    assert!(!setup.node(0).locks.is_locked(key).await?);
    assert!(!setup.node(1).locks.is_locked(key).await?);
    assert!(setup.node(2).locks.is_locked(key).await?);
    assert_eq!(setup.node(0).mining_state(tx.hash), None);
    assert!(
        setup
            .node(0)
            .chain()
            .repo()
            .get_pending(tx.hash)
            .await?
            .is_none()
    );
    Ok(())
}

#[test]
fn validator_checks_the_pool_descriptor() {
    let setup = Setup::new(3);
    let (coordinator, validator, outsider) = (setup.node(0), setup.node(1), setup.node(2));
    let tx = setup.tx();

    let master_validation = MasterValidation {
        proof_of_work: Some(setup.emitter.pubkey()),
        previous_miners: vec![],
        validation: Validation::new_sign(ValidationStatus::Ok, coordinator.seckey),
    };
    let validator_pool =
        ElectedNodeList::new_sign(ElectedNodes(vec![elected(validator)]), coordinator.seckey);
    let req = ConfirmationRequest {
        transaction: tx.clone(),
        master_validation: master_validation.clone(),
        validator_pool: validator_pool.clone(),
    };

    let validation = validator
        .handle_confirmation(req.clone())
        .expect("Elected validator answers");
    assert_eq!(validation.status, ValidationStatus::Ok);
    assert_eq!(validation.node_pubkey, validator.pubkey());
    assert_eq!(validation.check(), Ok(()));

    assert!(matches!(
        outsider.handle_confirmation(req.clone()),
        Err(ConfirmationError::NotElected)
    ));

    let mut tampered = req.clone();
    tampered.validator_pool.nodes.0.push(elected(outsider));
    assert!(matches!(
        outsider.handle_confirmation(tampered),
        Err(ConfirmationError::InvalidPool { .. })
    ));

    let foreign = ConfirmationRequest {
        validator_pool: ElectedNodeList::new_sign(
            ElectedNodes(vec![elected(validator)]),
            outsider.seckey,
        ),
        ..req.clone()
    };
    assert!(matches!(
        validator.handle_confirmation(foreign),
        Err(ConfirmationError::ForeignPool { .. })
    ));

    // Well-formed requests about bad transactions get a KO
    let mut invalid = req.clone();
    invalid.transaction.content.address = TxAddress::from_pubkey(Seckey::generate().pubkey());
    let validation = validator
        .handle_confirmation(invalid)
        .expect("Elected validator answers");
    assert_eq!(validation.status, ValidationStatus::Ko);

    let forged_pow = ConfirmationRequest {
        master_validation: MasterValidation {
            proof_of_work: Some(Seckey::generate().pubkey()),
            ..master_validation
        },
        ..req
    };
    let validation = validator
        .handle_confirmation(forged_pow)
        .expect("Elected validator answers");
    assert_eq!(validation.status, ValidationStatus::Ko);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn unreachable_nodes_fail_requests() -> BoxedErrorResult<()> {
    let setup = Setup::new(3);
    let tx = setup.tx();
    let key = LockKey::new(tx.hash, tx.address());
    let peer = setup.node(1).pubkey();
    let req = LockRequest::new(key, setup.node(0).pubkey(), Duration::from_secs(60));

    assert_eq!(setup.network.count_reachable(), 3);
    setup.network.set_reachable(peer, false);
    assert_eq!(setup.network.count_reachable(), 2);
    assert_eq!(
        setup.network.find_by_pubkey(peer).map(|node| node.is_reachable),
        Some(false)
    );

    assert!(matches!(
        setup.network.request_lock(peer, req).await,
        Err(PeerError::Unreachable { .. })
    ));
    assert!(!setup.node(1).locks.is_locked(key).await?);

    setup.network.set_reachable(peer, true);
    setup.network.request_lock(peer, req).await?;
    assert!(setup.node(1).locks.is_locked(key).await?);

    // Lease conflicts come back as refusals
    assert!(matches!(
        setup.network.request_lock(peer, req).await,
        Err(PeerError::Rejected { .. })
    ));
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn only_latest_finished_states_are_kept() -> BoxedErrorResult<()> {
    let setup = Setup::with_config(3, MiningConfig::builder().max_finished_states(2).build());
    let coordinator = setup.node(0);

    let mut hashes = vec![];
    for _ in 0..3 {
        let tx = setup.tx();
        hashes.push(tx.hash);
        coordinator.lead_mining(tx.clone(), 1).await?;
        assert_eq!(
            coordinator.wait_mining_outcome(tx.hash).await,
            MiningOutcome::Stored(ValidationStatus::Ok)
        );
    }

    assert_eq!(coordinator.mining_state(hashes[0]), None);
    for hash in &hashes[1..] {
        assert_eq!(
            coordinator.mining_state(*hash),
            Some(MiningState::Released(MiningOutcome::Stored(
                ValidationStatus::Ok
            )))
        );
    }
    assert_eq!(coordinator.subscribe_mining_states().borrow().len(), 2);
    Ok(())
}

#[test]
fn verdicts_need_confirmations() {
    let setup = Setup::new(1);
    let mut tx = setup.tx();
    let master_validation = MasterValidation {
        proof_of_work: Some(setup.emitter.pubkey()),
        previous_miners: vec![],
        validation: Validation::new_sign(ValidationStatus::Ok, setup.node(0).seckey),
    };

    assert_eq!(
        attach_verdicts(&mut tx, master_validation.clone(), vec![]),
        Err(MiningOutcome::AttachFailed)
    );
    assert!(!tx.is_mined());

    let confirmation = Validation::new_sign(ValidationStatus::Ko, Seckey::generate());
    assert_eq!(
        attach_verdicts(&mut tx, master_validation.clone(), vec![confirmation.clone()]),
        Ok(ValidationStatus::Ko)
    );
    assert_eq!(
        attach_verdicts(&mut tx, master_validation, vec![confirmation]),
        Err(MiningOutcome::AttachFailed)
    );
}
