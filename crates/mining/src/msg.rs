use std::time::Duration;

use bincode::{Decode, Encode};
use uniledger_core::elected::ElectedNodeList;
use uniledger_core::keys::Pubkey;
use uniledger_core::transaction::Transaction;
use uniledger_core::validation::MasterValidation;
use uniledger_lock::LockKey;

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockRequest {
    pub key: LockKey,
    pub owner: Pubkey,
    pub ttl_millis: u64,
}

impl LockRequest {
    pub fn new(key: LockKey, owner: Pubkey, ttl: Duration) -> Self {
        Self {
            key,
            owner,
            ttl_millis: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis)
    }
}

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub key: LockKey,
}

/// What a coordinator sends to each elected validator
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub transaction: Transaction,
    pub master_validation: MasterValidation,
    pub validator_pool: ElectedNodeList,
}

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ReplicationRequest {
    pub transaction: Transaction,
}
