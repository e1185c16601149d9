use std::time::Duration;

use super::*;
use crate::validation::ValidationStatus;

fn seconds_ago(secs: u64) -> Timestamp {
    Timestamp::now().saturating_sub_duration(Duration::from_secs(secs))
}

fn keychain_at(timestamp: Timestamp, seckey: Seckey, emitter: Seckey) -> Transaction {
    Transaction::new_test_dummy(TransactionType::Keychain, timestamp, seckey, emitter)
}

fn flip_byte<const N: usize>(bytes: [u8; N], idx: usize) -> [u8; N] {
    let mut bytes = bytes;
    bytes[idx] ^= 0x01;
    bytes
}

#[test]
fn fresh_transaction_is_valid() {
    let tx = keychain_at(seconds_ago(1), Seckey::generate(), Seckey::generate());
    assert_eq!(tx.is_valid(), Ok(()));
    assert_eq!(tx.check_chain_integrity(), Ok(()));
}

#[test]
fn any_single_byte_change_invalidates() {
    let tx = keychain_at(seconds_ago(1), Seckey::generate(), Seckey::generate());

    let mut tampered = tx.clone();
    let value = tampered
        .content
        .data
        .values_mut()
        .next()
        .expect("has data");
    *value = value.replacen("00", "01", 1);
    assert!(tampered.is_valid().is_err());

    let mut tampered = tx.clone();
    tampered.content.address = TxAddress::from_bytes(flip_byte(tx.content.address.to_bytes(), 7));
    assert!(matches!(
        tampered.is_valid(),
        Err(InvalidTransactionError::Integrity {
            source: IntegrityError::HashMismatch { .. }
        })
    ));

    let mut tampered = tx.clone();
    tampered.signature = Signature::from_bytes(flip_byte(tx.signature.to_bytes(), 3));
    assert!(tampered.is_valid().is_err());

    // Recomputing the hash still leaves a bad signature behind
    tampered.hash = tampered.compute_hash();
    assert_eq!(
        tampered.is_valid(),
        Err(InvalidTransactionError::Integrity {
            source: IntegrityError::InvalidSignature
        })
    );

    let mut tampered = tx.clone();
    tampered.hash = TxHash::from_bytes(flip_byte(tx.hash.to_bytes(), 31));
    assert!(matches!(
        tampered.is_valid(),
        Err(InvalidTransactionError::Integrity {
            source: IntegrityError::HashMismatch { .. }
        })
    ));
}

#[test]
fn structural_checks_run_before_integrity() {
    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), Seckey::generate());
    tx.content.data.clear();
    assert_eq!(
        tx.is_valid(),
        Err(InvalidTransactionError::Structure {
            source: ValidationError::EmptyData
        })
    );

    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), Seckey::generate());
    tx.content.proposal = None;
    assert_eq!(
        tx.is_valid(),
        Err(InvalidTransactionError::Structure {
            source: ValidationError::MissingProposal
        })
    );

    let future = Timestamp::now()
        .checked_add_duration(Duration::from_secs(3600))
        .expect("no overflow");
    let tx = keychain_at(future, Seckey::generate(), Seckey::generate());
    assert_eq!(
        tx.is_valid(),
        Err(InvalidTransactionError::Structure {
            source: ValidationError::FutureTimestamp { timestamp: future }
        })
    );
}

#[test]
fn chain_requires_strictly_increasing_timestamps() {
    let seckey = Seckey::generate();
    let emitter = Seckey::generate();
    let first = keychain_at(seconds_ago(20), seckey, emitter);
    let second_ts = seconds_ago(10);
    let mut second = keychain_at(second_ts, seckey, emitter);
    second.chain(Some(first.clone())).expect("ordered chain");

    let mut third = keychain_at(seconds_ago(5), seckey, emitter);
    third.chain(Some(second.clone())).expect("ordered chain");
    assert_eq!(third.check_chain_integrity(), Ok(()));
    assert_eq!(
        third.previous().and_then(Transaction::previous),
        Some(&first)
    );

    // Same timestamp as the head is rejected, and nothing is linked
    let mut same = keychain_at(second_ts, seckey, emitter);
    assert_eq!(
        same.chain(Some(second.clone())),
        Err(ChainError::Ordering {
            previous: second_ts,
            next: second_ts,
        })
    );
    assert!(same.previous().is_none());

    let mut older = keychain_at(seconds_ago(30), seckey, emitter);
    assert!(matches!(
        older.chain(Some(second)),
        Err(ChainError::Ordering { .. })
    ));
}

#[test]
fn chain_rejects_tampered_ancestor() {
    let seckey = Seckey::generate();
    let emitter = Seckey::generate();
    let mut first = keychain_at(seconds_ago(20), seckey, emitter);
    first.content.address = rand::random();
    let first_hash = first.hash;

    let mut second = keychain_at(seconds_ago(10), seckey, emitter);
    assert!(matches!(
        second.chain(Some(first)),
        Err(ChainError::InvalidLink { hash, .. }) if hash == first_hash
    ));
}

#[test]
fn detach_previous_keeps_only_the_link() {
    let seckey = Seckey::generate();
    let emitter = Seckey::generate();
    let first = keychain_at(seconds_ago(20), seckey, emitter);
    let mut second = keychain_at(seconds_ago(10), seckey, emitter);
    second.chain(Some(first.clone())).expect("ordered chain");

    let (detached, previous_hash) = second.detach_previous();
    assert_eq!(previous_hash, Some(first.hash));
    assert!(detached.previous().is_none());
    assert_eq!(detached.is_valid(), Ok(()));
}

#[test]
fn proof_of_work_finds_the_emitter_key() {
    let emitter = Seckey::generate();
    let tx = keychain_at(seconds_ago(1), Seckey::generate(), emitter);
    let others: Vec<Pubkey> = (0..3).map(|_| Seckey::generate().pubkey()).collect();

    assert_eq!(tx.find_proof_of_work(&others), None);

    let mut keys = others.clone();
    keys.insert(1, emitter.pubkey());
    assert_eq!(tx.find_proof_of_work(&keys), Some(emitter.pubkey()));
}

#[test]
fn master_validation_with_foreign_proof_of_work_is_rejected() {
    let coordinator = Seckey::generate();
    let tx = keychain_at(seconds_ago(1), Seckey::generate(), Seckey::generate());

    let master = MasterValidation {
        proof_of_work: Some(Seckey::generate().pubkey()),
        previous_miners: vec![],
        validation: Validation::new_sign(ValidationStatus::Ok, coordinator),
    };
    assert_eq!(
        tx.verify_master_validation(&master),
        Err(MasterValidationError::InvalidProofOfWork)
    );
    assert_eq!(
        tx.check_master_validation(),
        Err(MasterValidationError::MissingMasterValidation)
    );
}

#[test]
fn attach_mining_result_once() {
    let coordinator = Seckey::generate();
    let validator = Seckey::generate();
    let emitter = Seckey::generate();
    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), emitter);

    let master = MasterValidation {
        proof_of_work: Some(emitter.pubkey()),
        previous_miners: vec![],
        validation: Validation::new_sign(ValidationStatus::Ok, coordinator),
    };

    assert_eq!(
        tx.attach_mining_result(master.clone(), vec![]),
        Err(AttachMiningResultError::EmptyConfirmations)
    );
    assert!(!tx.is_mined());

    let confirmations = vec![Validation::new_sign(ValidationStatus::Ok, validator)];
    tx.attach_mining_result(master.clone(), confirmations.clone())
        .expect("first attach");
    assert!(tx.is_mined());
    assert!(!tx.is_ko());
    assert_eq!(tx.check_master_validation(), Ok(()));
    assert_eq!(tx.check_confirmations(), Ok(()));

    let mut expected_miners = vec![coordinator.pubkey(), validator.pubkey()];
    expected_miners.sort_unstable();
    assert_eq!(tx.miners(), expected_miners);

    assert_eq!(
        tx.attach_mining_result(master, confirmations),
        Err(AttachMiningResultError::AlreadyAttached)
    );
    // Attaching doesn't touch the hashed content
    assert_eq!(tx.is_valid(), Ok(()));
}

#[test]
fn any_ko_verdict_makes_transaction_ko() {
    let coordinator = Seckey::generate();
    let emitter = Seckey::generate();
    let master = MasterValidation {
        proof_of_work: Some(emitter.pubkey()),
        previous_miners: vec![],
        validation: Validation::new_sign(ValidationStatus::Ok, coordinator),
    };

    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), emitter);
    tx.attach_mining_result(
        master.clone(),
        vec![
            Validation::new_sign(ValidationStatus::Ok, Seckey::generate()),
            Validation::new_sign(ValidationStatus::Ko, Seckey::generate()),
        ],
    )
    .expect("first attach");
    assert!(tx.is_ko());

    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), emitter);
    tx.attach_mining_result(
        MasterValidation {
            proof_of_work: None,
            validation: Validation::new_sign(ValidationStatus::Ko, coordinator),
            ..master
        },
        vec![Validation::new_sign(ValidationStatus::Ok, Seckey::generate())],
    )
    .expect("first attach");
    assert!(tx.is_ko());
}

#[test]
fn invalid_confirmation_is_reported_by_position() {
    let emitter = Seckey::generate();
    let mut tx = keychain_at(seconds_ago(1), Seckey::generate(), emitter);

    let mut forged = Validation::new_sign(ValidationStatus::Ok, Seckey::generate());
    forged.status = ValidationStatus::Ko;

    tx.attach_mining_result(
        MasterValidation {
            proof_of_work: Some(emitter.pubkey()),
            previous_miners: vec![],
            validation: Validation::new_sign(ValidationStatus::Ok, Seckey::generate()),
        },
        vec![
            Validation::new_sign(ValidationStatus::Ok, Seckey::generate()),
            forged,
        ],
    )
    .expect("first attach");

    assert!(matches!(
        tx.check_confirmations(),
        Err((1, InvalidValidationError::InvalidNodeSignature { .. }))
    ));
}
