// SPDX-License-Identifier: MIT

//! Election of coordinator, validator and storage pools
//!
//! Elections are deterministic: any node with the same topology snapshot,
//! candidate keys and seed elects the same pool. The order candidates are
//! considered in comes from an [`EntropySort`] of the transaction hash, so
//! it is unpredictable until the transaction is known.
//!
//! Every elected pool is returned as an [`ElectedNodeList`] signed by the
//! electing node, so its members can verify it without re-running the
//! election.
//!
//! [`ElectedNodeList`]: uniledger_core::elected::ElectedNodeList

mod entropy;
mod error;
mod fee;
mod pool;
mod required;
mod topology;

pub use entropy::{Blake3EntropySort, EntropySort};
pub use error::{ElectionError, ElectionResult};
pub use fee::{FeeMatrix, FeeSchedule};
pub use pool::{Election, verify_elected_list};
pub use required::{required_coordinators, required_validators_for_system_tx};
pub use topology::{NodeInfo, TopologyReader, TopologySnapshot};

const LOG_TARGET: &str = "uniledger::election";
