use bincode::{Decode, Encode};
use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::keys::Pubkey;
use uniledger_core::timestamp::Timestamp;
use uniledger_util_db::def_table;

use crate::LockKey;

#[derive(Encode, Decode, Debug, Clone, Copy)]
pub struct LeaseRecord {
    pub tx_hash: TxHash,
    pub owner: Pubkey,
    pub expiry: Timestamp,
}

impl LeaseRecord {
    pub fn key(&self, tx_address: TxAddress) -> LockKey {
        LockKey::new(self.tx_hash, tx_address)
    }
}

def_table! {
    /// Leases by chain address, live or not yet swept
    ///
    /// A record past its `expiry` is treated as absent.
    lease_locks: TxAddress => LeaseRecord
}
