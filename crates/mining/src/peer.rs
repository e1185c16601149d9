use std::sync::Arc;

use async_trait::async_trait;
use snafu::Snafu;
use uniledger_core::keys::Pubkey;
use uniledger_core::validation::Validation;

use crate::msg::{ConfirmationRequest, LockRequest, ReleaseRequest, ReplicationRequest};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PeerError {
    #[snafu(display("Peer {} is unreachable", peer.to_short()))]
    Unreachable { peer: Pubkey },
    #[snafu(display("Peer {} rejected the request: {message}", peer.to_short()))]
    Rejected { peer: Pubkey, message: String },
    #[snafu(display("Malformed message for peer {}", peer.to_short()))]
    Malformed {
        peer: Pubkey,
        source: bincode::error::DecodeError,
    },
}

impl PeerError {
    /// Could asking again help
    pub fn is_retryable(&self) -> bool {
        matches!(self, PeerError::Unreachable { .. })
    }
}

pub type PeerResult<T> = Result<T, PeerError>;

/// Requests a mining node sends to other nodes
#[async_trait]
pub trait PeerClient {
    async fn request_lock(&self, peer: Pubkey, req: LockRequest) -> PeerResult<()>;

    async fn request_release(&self, peer: Pubkey, req: ReleaseRequest) -> PeerResult<()>;

    /// Ask a validator for its verdict on a transaction
    async fn request_confirmation(
        &self,
        peer: Pubkey,
        req: ConfirmationRequest,
    ) -> PeerResult<Validation>;

    /// Hand a mined transaction to a storage node
    async fn replicate(&self, peer: Pubkey, req: ReplicationRequest) -> PeerResult<()>;
}

pub type PeerClientRef = Arc<dyn PeerClient + Send + Sync + 'static>;
