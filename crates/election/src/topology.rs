use std::collections::BTreeMap;

use uniledger_core::geo_patch::{PatchId, compute_patch};
use uniledger_core::keys::Pubkey;

/// What the network knows about a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub pubkey: Pubkey,
    pub is_reachable: bool,
    pub patch: PatchId,
    pub is_healthy: bool,
}

impl NodeInfo {
    /// Reachable, healthy node in `patch`
    pub fn new(pubkey: Pubkey, patch: PatchId) -> Self {
        Self {
            pubkey,
            is_reachable: true,
            patch,
            is_healthy: true,
        }
    }

    /// Reachable, healthy node at the given coordinates
    ///
    /// `None` if the coordinates are outside the grid.
    pub fn at_coordinates(pubkey: Pubkey, lat: f64, lon: f64) -> Option<Self> {
        compute_patch(lat, lon).map(|patch| Self::new(pubkey, patch))
    }

    pub fn unreachable(self) -> Self {
        Self {
            is_reachable: false,
            ..self
        }
    }
}

/// Read access to the current network topology
pub trait TopologyReader {
    /// All known nodes, reachable or not, ordered by key
    fn nodes(&self) -> Vec<NodeInfo>;

    fn reachable_nodes(&self) -> Vec<NodeInfo> {
        self.nodes()
            .into_iter()
            .filter(|node| node.is_reachable)
            .collect()
    }

    fn count_reachable(&self) -> usize {
        self.reachable_nodes().len()
    }

    fn find_by_pubkey(&self, pubkey: Pubkey) -> Option<NodeInfo>;
}

/// Immutable topology, as seen at one point in time
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    nodes: BTreeMap<Pubkey, NodeInfo>,
}

impl TopologySnapshot {
    pub fn new(nodes: impl IntoIterator<Item = NodeInfo>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.pubkey, node)).collect(),
        }
    }

    /// Copy with reachability of `pubkey` changed
    pub fn with_reachable(&self, pubkey: Pubkey, is_reachable: bool) -> Self {
        let mut nodes = self.nodes.clone();
        if let Some(node) = nodes.get_mut(&pubkey) {
            node.is_reachable = is_reachable;
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TopologyReader for TopologySnapshot {
    fn nodes(&self) -> Vec<NodeInfo> {
        self.nodes.values().copied().collect()
    }

    fn reachable_nodes(&self) -> Vec<NodeInfo> {
        self.nodes
            .values()
            .filter(|node| node.is_reachable)
            .copied()
            .collect()
    }

    fn count_reachable(&self) -> usize {
        self.nodes.values().filter(|node| node.is_reachable).count()
    }

    fn find_by_pubkey(&self, pubkey: Pubkey) -> Option<NodeInfo> {
        self.nodes.get(&pubkey).copied()
    }
}
