use std::time::Duration;

use uniledger_lock::DEFAULT_LOCK_TTL;

/// Timeouts and thresholds of one mining node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningConfig {
    /// How long a mining lease lives if never released
    pub lock_ttl: Duration,
    /// Deadline of the validator fan-in
    pub consensus_timeout: Duration,
    /// Deadline for the storage pool to acknowledge a mined transaction
    pub replication_timeout: Duration,
    /// Storage acks needed for a transaction to count as stored
    pub min_replicas: usize,
    /// Confirmations a transaction needs before this node stores it
    pub min_confirmations: usize,
    /// Finished attempts whose state stays queryable, oldest dropped first
    pub max_finished_states: usize,
}

#[bon::bon]
impl MiningConfig {
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_LOCK_TTL)] lock_ttl: Duration,
        #[builder(default = Duration::from_secs(10))] consensus_timeout: Duration,
        #[builder(default = Duration::from_secs(10))] replication_timeout: Duration,
        #[builder(default = 1)] min_replicas: usize,
        #[builder(default = 1)] min_confirmations: usize,
        #[builder(default = 1024)] max_finished_states: usize,
    ) -> Self {
        Self {
            lock_ttl,
            consensus_timeout,
            replication_timeout,
            min_replicas,
            min_confirmations,
            max_finished_states,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
