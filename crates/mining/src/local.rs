use std::collections::BTreeMap;
use std::error;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use bincode::{Decode, Encode};
use snafu::{OptionExt as _, ResultExt as _};
use uniledger_core::bincode::LEDGER_BINCODE_CONFIG;
use uniledger_core::geo_patch::PatchId;
use uniledger_core::keys::Pubkey;
use uniledger_core::validation::Validation;
use uniledger_election::{NodeInfo, TopologyReader};
use uniledger_util_bincode::{decode_whole, encode_infallible};
use uniledger_util_error::fmt::FmtCompact as _;

use crate::Node;
use crate::msg::{ConfirmationRequest, LockRequest, ReleaseRequest, ReplicationRequest};
use crate::peer::{MalformedSnafu, PeerClient, PeerError, PeerResult, UnreachableSnafu};

struct LocalPeer {
    info: NodeInfo,
    node: Weak<Node>,
}

/// In-process network of [`Node`]s
///
/// Serves both as the transport between its nodes and as their topology.
/// Requests and responses are encoded and decoded on the way, like they
/// would be on a real connection.
#[derive(Default)]
pub struct LocalNetwork {
    peers: RwLock<BTreeMap<Pubkey, LocalPeer>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add `node` to the network, reachable, in `patch`
    pub fn register(&self, node: &Arc<Node>, patch: PatchId) {
        self.peers.write().expect("Locking failed").insert(
            node.pubkey(),
            LocalPeer {
                info: NodeInfo::new(node.pubkey(), patch),
                node: Arc::downgrade(node),
            },
        );
    }

    /// Cut a node off, or bring it back
    ///
    /// Unreachable nodes fail every request, and the topology reports them
    /// as such.
    pub fn set_reachable(&self, pubkey: Pubkey, is_reachable: bool) {
        if let Some(peer) = self
            .peers
            .write()
            .expect("Locking failed")
            .get_mut(&pubkey)
        {
            peer.info.is_reachable = is_reachable;
        }
    }

    fn connect(&self, peer: Pubkey) -> PeerResult<Arc<Node>> {
        self.peers
            .read()
            .expect("Locking failed")
            .get(&peer)
            .filter(|local| local.info.is_reachable)
            .and_then(|local| local.node.upgrade())
            .context(UnreachableSnafu { peer })
    }
}

/// Encode and decode `value`, as sending it to `peer` would
fn send<T: Encode + Decode<()>>(peer: Pubkey, value: &T) -> PeerResult<T> {
    let bytes = encode_infallible(value, LEDGER_BINCODE_CONFIG);
    decode_whole(&bytes, LEDGER_BINCODE_CONFIG).context(MalformedSnafu { peer })
}

fn rejected(peer: Pubkey, err: &(impl error::Error + ?Sized)) -> PeerError {
    PeerError::Rejected {
        peer,
        message: err.fmt_compact().to_string(),
    }
}

impl TopologyReader for LocalNetwork {
    fn nodes(&self) -> Vec<NodeInfo> {
        self.peers
            .read()
            .expect("Locking failed")
            .values()
            .map(|local| local.info)
            .collect()
    }

    fn find_by_pubkey(&self, pubkey: Pubkey) -> Option<NodeInfo> {
        self.peers
            .read()
            .expect("Locking failed")
            .get(&pubkey)
            .map(|local| local.info)
    }
}

#[async_trait]
impl PeerClient for LocalNetwork {
    async fn request_lock(&self, peer: Pubkey, req: LockRequest) -> PeerResult<()> {
        let node = self.connect(peer)?;
        node.handle_lock(send(peer, &req)?)
            .await
            .map_err(|err| rejected(peer, &err))
    }

    async fn request_release(&self, peer: Pubkey, req: ReleaseRequest) -> PeerResult<()> {
        let node = self.connect(peer)?;
        node.handle_release(send(peer, &req)?)
            .await
            .map_err(|err| rejected(peer, &err))
    }

    async fn request_confirmation(
        &self,
        peer: Pubkey,
        req: ConfirmationRequest,
    ) -> PeerResult<Validation> {
        let node = self.connect(peer)?;
        let validation = node
            .handle_confirmation(send(peer, &req)?)
            .map_err(|err| rejected(peer, &err))?;
        send(peer, &validation)
    }

    async fn replicate(&self, peer: Pubkey, req: ReplicationRequest) -> PeerResult<()> {
        let node = self.connect(peer)?;
        node.handle_replication(send(peer, &req)?)
            .await
            .map(|_outcome| ())
            .map_err(|err| rejected(peer, &err))
    }
}
