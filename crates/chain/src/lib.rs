// SPDX-License-Identifier: MIT

//! Storage side of mining
//!
//! [`ChainService`] decides where a mined transaction goes (the KO store, a
//! keychain chain, or the id store), and answers status queries. Storage
//! itself sits behind [`LedgerRepository`], with an in-memory
//! ([`MemLedger`]) and a persistent ([`RedbLedger`]) implementation.

mod mem;
mod persistent;
mod repository;
mod service;
mod tables;

pub use mem::MemLedger;
pub use persistent::RedbLedger;
pub use repository::{LedgerRecord, LedgerRepository, LedgerRepositoryRef};
pub use service::{ChainService, StorageError, StorageOutcome, TransactionStatus};

const LOG_TARGET: &str = "uniledger::chain";
