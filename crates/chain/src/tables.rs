//! Tables of the ledger stores
//!
//! Every mined transaction lives in exactly one of [`ledger_ko`],
//! [`ledger_keychain`] and [`ledger_id`].

use uniledger_core::hash::{TxAddress, TxHash};
use uniledger_core::timestamp::Timestamp;
use uniledger_core::transaction::Transaction;
use uniledger_util_db::def_table;

use crate::repository::LedgerRecord;

def_table! {
    /// Transactions currently being mined by this node
    ledger_pending: TxHash => Transaction
}

def_table! {
    /// Transactions rejected by the coordinator or any validator
    ledger_ko: TxHash => Transaction
}

def_table! {
    /// Keychain links
    ledger_keychain: TxHash => LedgerRecord
}

def_table! {
    /// Most recent keychain link of each address
    ledger_keychain_head: TxAddress => (Timestamp, TxHash)
}

def_table! {
    ledger_id: TxHash => Transaction
}

def_table! {
    ledger_id_by_address: TxAddress => TxHash
}
