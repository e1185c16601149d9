use std::fmt;

use bincode::{Decode, Encode};
use snafu::{ResultExt as _, Snafu, ensure};

use crate::keys::{Pubkey, Seckey, Signature};
use crate::signed::{Hashable, InvalidSignatureError, Signable};
use crate::timestamp::Timestamp;

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationStatus {
    Ok,
    Ko,
}

impl ValidationStatus {
    pub fn is_ok(self) -> bool {
        self == ValidationStatus::Ok
    }

    pub fn is_ko(self) -> bool {
        self == ValidationStatus::Ko
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationStatus::Ok => "OK",
            ValidationStatus::Ko => "KO",
        })
    }
}

/// The part of a [`Validation`] covered by the node signature
#[derive(Encode)]
struct ValidationPayload {
    status: ValidationStatus,
    node_pubkey: Pubkey,
    timestamp: Timestamp,
}

impl Hashable for ValidationPayload {}
impl Signable for ValidationPayload {
    const TAG: [u8; 4] = *b"vald";
}

/// A single node's signed verdict on a transaction
#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validation {
    pub status: ValidationStatus,
    pub timestamp: Timestamp,
    pub node_pubkey: Pubkey,
    pub node_signature: Signature,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum InvalidValidationError {
    #[snafu(display("Validation timestamp {timestamp} is in the future"))]
    FutureTimestamp { timestamp: Timestamp },
    #[snafu(display("Malformed node public key {node_pubkey}"))]
    MalformedNodeKey { node_pubkey: Pubkey },
    #[snafu(display("Invalid signature of node {node_pubkey}"))]
    InvalidNodeSignature {
        node_pubkey: Pubkey,
        source: InvalidSignatureError,
    },
}

pub type InvalidValidationResult<T> = Result<T, InvalidValidationError>;

impl Validation {
    pub fn new_sign(status: ValidationStatus, seckey: Seckey) -> Self {
        Self::new_sign_at(status, Timestamp::now(), seckey)
    }

    pub fn new_sign_at(status: ValidationStatus, timestamp: Timestamp, seckey: Seckey) -> Self {
        let node_pubkey = seckey.pubkey();
        let node_signature = ValidationPayload {
            status,
            node_pubkey,
            timestamp,
        }
        .sign_with(seckey);

        Self {
            status,
            timestamp,
            node_pubkey,
            node_signature,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn is_ko(&self) -> bool {
        self.status.is_ko()
    }

    pub fn check(&self) -> InvalidValidationResult<()> {
        ensure!(
            !self.timestamp.is_in_future(),
            FutureTimestampSnafu {
                timestamp: self.timestamp
            }
        );
        ensure!(
            self.node_pubkey.is_well_formed(),
            MalformedNodeKeySnafu {
                node_pubkey: self.node_pubkey
            }
        );

        ValidationPayload {
            status: self.status,
            node_pubkey: self.node_pubkey,
            timestamp: self.timestamp,
        }
        .verify_signature(self.node_pubkey, self.node_signature)
        .context(InvalidNodeSignatureSnafu {
            node_pubkey: self.node_pubkey,
        })?;

        Ok(())
    }
}

/// The coordinator's verdict, carrying what validators need to re-check it
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct MasterValidation {
    /// Emitter cross key that verified the emitter signature, `None` if no
    /// key matched
    pub proof_of_work: Option<Pubkey>,
    /// Keys of the pool that mined the previous link of the chain
    pub previous_miners: Vec<Pubkey>,
    /// Coordinator's own validation
    pub validation: Validation,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum MasterValidationError {
    #[snafu(display("Transaction was not mined"))]
    MissingMasterValidation,
    #[snafu(display("Invalid coordinator validation"))]
    InvalidCoordinatorValidation { source: InvalidValidationError },
    #[snafu(display("Master validation is OK without a proof of work"))]
    MissingProofOfWork,
    #[snafu(display("Invalid proof of work"))]
    InvalidProofOfWork,
}

impl MasterValidation {
    pub fn status(&self) -> ValidationStatus {
        self.validation.status
    }

    pub fn coordinator(&self) -> Pubkey {
        self.validation.node_pubkey
    }

    /// Check everything that doesn't need the transaction itself
    ///
    /// An OK verdict must name the matched proof of work.
    pub fn check(&self) -> Result<(), MasterValidationError> {
        self.validation
            .check()
            .context(InvalidCoordinatorValidationSnafu)?;

        ensure!(
            self.proof_of_work.is_some() || self.status().is_ko(),
            MissingProofOfWorkSnafu
        );
        Ok(())
    }
}
