use std::fmt;

use uniledger_core::validation::ValidationStatus;

/// Where a mining attempt currently is
///
/// Attempts that fail to lock never get a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    Locked,
    /// Own verdict reached, KO if pre-validation failed
    PreValidated(ValidationStatus),
    AwaitingConfirmations,
    Mined(ValidationStatus),
    Stored(ValidationStatus),
    /// Lock released, nothing left to do
    Released(MiningOutcome),
}

impl MiningState {
    pub fn outcome(self) -> Option<MiningOutcome> {
        match self {
            MiningState::Released(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// How a mining attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    /// Stored by enough of the storage pool, with the consensus verdict
    Stored(ValidationStatus),
    /// Not enough reachable validators or patches
    ElectionFailed,
    /// Validators did not settle the verdict before the deadline
    ConsensusTimeout,
    /// Not enough storage nodes acknowledged before the deadline
    ReplicationTimeout,
    /// Every storage node answered, and too many refused the transaction
    StorageRejected,
    /// Verdicts could not be attached to the transaction
    AttachFailed,
}

impl fmt::Display for MiningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningOutcome::Stored(status) => write!(f, "stored ({status})"),
            MiningOutcome::ElectionFailed => f.write_str("election failed"),
            MiningOutcome::ConsensusTimeout => f.write_str("consensus timeout"),
            MiningOutcome::ReplicationTimeout => f.write_str("replication timeout"),
            MiningOutcome::StorageRejected => f.write_str("storage rejected"),
            MiningOutcome::AttachFailed => f.write_str("attach failed"),
        }
    }
}
