use std::collections::BTreeMap;
use std::fmt;

use bincode::{Decode, Encode};
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::hash::{TxAddress, TxHash};
use crate::keys::{Pubkey, Seckey, Signature};
use crate::signed::{Hashable, Signable, verify_hash_signature};
use crate::timestamp::Timestamp;
use crate::validation::{
    InvalidValidationError, MasterValidation, MasterValidationError, Validation,
};

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionType {
    Keychain,
    Id,
    Contract,
    ContractMessage,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionType::Keychain => "keychain",
            TransactionType::Id => "id",
            TransactionType::Contract => "contract",
            TransactionType::ContractMessage => "contract-message",
        })
    }
}

/// Proposal of the next shared emitter key, embedded in every transaction
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub shared_pubkey: Pubkey,
    pub encrypted_shared_seckey: Vec<u8>,
}

/// Everything the submitter signs
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TransactionContent {
    pub address: TxAddress,
    pub tx_type: TransactionType,
    /// Field name → hex-encoded ciphertext
    pub data: BTreeMap<String, String>,
    pub timestamp: Timestamp,
    pub public_key: Pubkey,
    pub proposal: Option<Proposal>,
}

impl Hashable for TransactionContent {}
impl Signable for TransactionContent {
    const TAG: [u8; 4] = *b"txcn";
}

#[bon::bon]
impl TransactionContent {
    #[builder]
    pub fn new(
        address: TxAddress,
        tx_type: TransactionType,
        #[builder(default)] data: BTreeMap<String, String>,
        #[builder(default = Timestamp::now())] timestamp: Timestamp,
        public_key: Pubkey,
        proposal: Option<Proposal>,
    ) -> Self {
        Self {
            address,
            tx_type,
            data,
            timestamp,
            public_key,
            proposal,
        }
    }
}

/// What an emitter cross key signs: the content, and the submitter's
/// signature over it
#[derive(Encode)]
struct EmitterPayload {
    content_hash: [u8; 32],
    signature: Signature,
}

impl Hashable for EmitterPayload {}
impl Signable for EmitterPayload {
    const TAG: [u8; 4] = *b"txem";
}

/// Input of the transaction hash
#[derive(Encode)]
struct DigestPayload {
    content_hash: [u8; 32],
    signature: Signature,
    emitter_signature: Signature,
}

impl Hashable for DigestPayload {}

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub content: TransactionContent,
    pub signature: Signature,
    /// Signature by one of the shared emitter cross keys, see
    /// [`Transaction::find_proof_of_work`]
    pub emitter_signature: Signature,
    pub hash: TxHash,
    previous: Option<Box<Transaction>>,
    master_validation: Option<MasterValidation>,
    confirmations: Vec<Validation>,
}

/// Structural defects, detected without any cryptography
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ValidationError {
    #[snafu(display("Transaction data is empty"))]
    EmptyData,
    #[snafu(display("Malformed transaction hash"))]
    MalformedHash,
    #[snafu(display("Malformed transaction address"))]
    MalformedAddress,
    #[snafu(display("Transaction timestamp {timestamp} is in the future"))]
    FutureTimestamp { timestamp: Timestamp },
    #[snafu(display("Malformed public key {public_key}"))]
    MalformedPublicKey { public_key: Pubkey },
    #[snafu(display("Malformed signature"))]
    MalformedSignature,
    #[snafu(display("Malformed emitter signature"))]
    MalformedEmitterSignature,
    #[snafu(display("Missing shared key proposal"))]
    MissingProposal,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum IntegrityError {
    #[snafu(display("Hash mismatch: expected {expected}, actual {actual}"))]
    HashMismatch { expected: TxHash, actual: TxHash },
    #[snafu(display("Invalid transaction signature"))]
    InvalidSignature,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum InvalidTransactionError {
    #[snafu(transparent)]
    Structure { source: ValidationError },
    #[snafu(transparent)]
    Integrity { source: IntegrityError },
}

pub type InvalidTransactionResult<T> = Result<T, InvalidTransactionError>;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ChainError {
    #[snafu(display("Malformed hash of the previous transaction"))]
    MalformedPreviousHash,
    #[snafu(display("Previous transaction at {previous} is not older than {next}"))]
    Ordering {
        previous: Timestamp,
        next: Timestamp,
    },
    #[snafu(display("Invalid transaction {hash} in chain"))]
    InvalidLink {
        hash: TxHash,
        source: InvalidTransactionError,
    },
}

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum AttachMiningResultError {
    #[snafu(display("No confirmations to attach"))]
    EmptyConfirmations,
    #[snafu(display("Mining result already attached"))]
    AlreadyAttached,
}

impl Transaction {
    /// Sign `content` as its submitter and as an emitter
    pub fn new_signed(content: TransactionContent, seckey: Seckey, emitter_seckey: Seckey) -> Self {
        let signature = content.sign_with(seckey);
        let emitter_signature = EmitterPayload {
            content_hash: *content.hash().as_bytes(),
            signature,
        }
        .sign_with(emitter_seckey);

        let mut tx = Self {
            content,
            signature,
            emitter_signature,
            hash: TxHash::ZERO,
            previous: None,
            master_validation: None,
            confirmations: vec![],
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Valid transaction with dummy ciphertexts in every required field
    ///
    /// The chain address derives from `seckey`. Useful mostly for testing.
    pub fn new_test_dummy(
        tx_type: TransactionType,
        timestamp: Timestamp,
        seckey: Seckey,
        emitter_seckey: Seckey,
    ) -> Self {
        let mut data: BTreeMap<String, String> = crate::projection::required_fields(tx_type)
            .iter()
            .map(|field| ((*field).to_owned(), "00ff".to_owned()))
            .collect();
        if data.is_empty() {
            data.insert("code".to_owned(), "00ff".to_owned());
        }

        let content = TransactionContent::builder()
            .address(TxAddress::from_pubkey(seckey.pubkey()))
            .tx_type(tx_type)
            .data(data)
            .timestamp(timestamp)
            .public_key(seckey.pubkey())
            .proposal(Proposal {
                shared_pubkey: Seckey::generate().pubkey(),
                encrypted_shared_seckey: vec![0; 32],
            })
            .build();
        Self::new_signed(content, seckey, emitter_seckey)
    }

    pub fn address(&self) -> TxAddress {
        self.content.address
    }

    pub fn tx_type(&self) -> TransactionType {
        self.content.tx_type
    }

    pub fn timestamp(&self) -> Timestamp {
        self.content.timestamp
    }

    pub fn previous(&self) -> Option<&Transaction> {
        self.previous.as_deref()
    }

    pub fn master_validation(&self) -> Option<&MasterValidation> {
        self.master_validation.as_ref()
    }

    pub fn confirmations(&self) -> &[Validation] {
        &self.confirmations
    }

    pub fn compute_hash(&self) -> TxHash {
        DigestPayload {
            content_hash: *self.content.hash().as_bytes(),
            signature: self.signature,
            emitter_signature: self.emitter_signature,
        }
        .hash()
        .into()
    }

    fn check_structure(&self) -> Result<(), ValidationError> {
        ensure!(!self.content.data.is_empty(), EmptyDataSnafu);
        ensure!(self.hash.is_well_formed(), MalformedHashSnafu);
        ensure!(self.content.address.is_well_formed(), MalformedAddressSnafu);
        ensure!(
            !self.content.timestamp.is_in_future(),
            FutureTimestampSnafu {
                timestamp: self.content.timestamp
            }
        );
        ensure!(
            self.content.public_key.is_well_formed(),
            MalformedPublicKeySnafu {
                public_key: self.content.public_key
            }
        );
        ensure!(self.signature.is_well_formed(), MalformedSignatureSnafu);
        ensure!(
            self.emitter_signature.is_well_formed(),
            MalformedEmitterSignatureSnafu
        );
        ensure!(self.content.proposal.is_some(), MissingProposalSnafu);
        Ok(())
    }

    /// Hash and submitter signature checks
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let actual = self.compute_hash();
        ensure!(
            actual == self.hash,
            HashMismatchSnafu {
                expected: self.hash,
                actual,
            }
        );

        self.content
            .verify_signature(self.content.public_key, self.signature)
            .ok()
            .context(InvalidSignatureSnafu)?;
        Ok(())
    }

    /// Full validity of this transaction alone
    ///
    /// Structural checks run first, so a transaction with a malformed field
    /// never reaches signature verification.
    pub fn is_valid(&self) -> InvalidTransactionResult<()> {
        self.check_structure()?;
        self.check_integrity()?;
        Ok(())
    }

    /// Validity of this transaction and, recursively, of all its ancestors
    ///
    /// Costs `O(depth)` signature verifications.
    pub fn check_chain_integrity(&self) -> ChainResult<()> {
        let mut current = self;
        loop {
            current
                .is_valid()
                .context(InvalidLinkSnafu { hash: current.hash })?;

            let Some(previous) = current.previous.as_deref() else {
                return Ok(());
            };

            ensure!(previous.hash.is_well_formed(), MalformedPreviousHashSnafu);
            ensure!(
                previous.content.timestamp < current.content.timestamp,
                OrderingSnafu {
                    previous: previous.content.timestamp,
                    next: current.content.timestamp,
                }
            );
            current = previous;
        }
    }

    /// Extend the chain whose current head is `previous`
    ///
    /// Nothing changes if the resulting chain doesn't pass
    /// [`Self::check_chain_integrity`].
    pub fn chain(&mut self, previous: Option<Transaction>) -> ChainResult<()> {
        let old = std::mem::replace(&mut self.previous, previous.map(Box::new));
        if let Err(err) = self.check_chain_integrity() {
            self.previous = old;
            return Err(err);
        }
        Ok(())
    }

    /// Link an ancestor loaded from storage, without verification
    ///
    /// Callers must follow up with [`Self::check_chain_integrity`] (usually
    /// via [`Self::chain`] of the next transaction).
    pub fn link_previous_unchecked(&mut self, previous: Transaction) {
        self.previous = Some(Box::new(previous));
    }

    /// Split off the ancestors, leaving only the hash of the direct one
    pub fn detach_previous(mut self) -> (Transaction, Option<TxHash>) {
        let previous_hash = self.previous.take().map(|p| p.hash);
        (self, previous_hash)
    }

    /// Does `emitter_pubkey` verify the emitter signature
    pub fn verify_emitter_signature(&self, emitter_pubkey: Pubkey) -> bool {
        let payload = EmitterPayload {
            content_hash: *self.content.hash().as_bytes(),
            signature: self.signature,
        };
        verify_hash_signature(payload.sign_hash(), emitter_pubkey, self.emitter_signature).is_ok()
    }

    /// Scan the shared emitter cross keys for one verifying the emitter
    /// signature
    pub fn find_proof_of_work(&self, emitter_pubkeys: &[Pubkey]) -> Option<Pubkey> {
        emitter_pubkeys
            .iter()
            .copied()
            .find(|pubkey| self.verify_emitter_signature(*pubkey))
    }

    /// Check `master` as a verdict on this transaction
    pub fn verify_master_validation(
        &self,
        master: &MasterValidation,
    ) -> Result<(), MasterValidationError> {
        master.check()?;

        if let Some(proof_of_work) = master.proof_of_work {
            ensure!(
                self.verify_emitter_signature(proof_of_work),
                crate::validation::InvalidProofOfWorkSnafu
            );
        }
        Ok(())
    }

    /// Check the attached master validation
    pub fn check_master_validation(&self) -> Result<(), MasterValidationError> {
        let master = self
            .master_validation
            .as_ref()
            .context(crate::validation::MissingMasterValidationSnafu)?;
        self.verify_master_validation(master)
    }

    /// Check every attached confirmation, reporting the first invalid one
    pub fn check_confirmations(&self) -> Result<(), (usize, InvalidValidationError)> {
        for (idx, confirmation) in self.confirmations.iter().enumerate() {
            confirmation.check().map_err(|err| (idx, err))?;
        }
        Ok(())
    }

    /// Did the coordinator or any validator reject this transaction
    pub fn is_ko(&self) -> bool {
        self.master_validation
            .as_ref()
            .is_some_and(|master| master.status().is_ko())
            || self.confirmations.iter().any(Validation::is_ko)
    }

    pub fn is_mined(&self) -> bool {
        self.master_validation.is_some()
    }

    /// Set the outcome of mining, exactly once
    pub fn attach_mining_result(
        &mut self,
        master_validation: MasterValidation,
        confirmations: Vec<Validation>,
    ) -> Result<(), AttachMiningResultError> {
        ensure!(!confirmations.is_empty(), EmptyConfirmationsSnafu);
        ensure!(self.master_validation.is_none(), AlreadyAttachedSnafu);

        self.master_validation = Some(master_validation);
        self.confirmations = confirmations;
        Ok(())
    }

    /// Pool that mined this transaction: the coordinator and every
    /// confirming validator
    pub fn miners(&self) -> Vec<Pubkey> {
        let mut miners: Vec<Pubkey> = self
            .master_validation
            .iter()
            .map(MasterValidation::coordinator)
            .chain(self.confirmations.iter().map(|c| c.node_pubkey))
            .collect();
        miners.sort_unstable();
        miners.dedup();
        miners
    }
}

#[cfg(test)]
mod tests;
