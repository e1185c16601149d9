//! Network-wide shared key material
//!
//! Emitter cross keys are the keys a transaction's emitter signature must
//! verify against. The node cross key seeds the election entropy.

use std::collections::BTreeSet;

use crate::keys::{Pubkey, Seckey};

pub trait SharedKeysReader: Send + Sync {
    /// Current emitter cross public keys, in a stable order
    fn emitter_cross_pubkeys(&self) -> Vec<Pubkey>;

    /// Nodes allowed to coordinate, `None` if any node is
    fn authorized_nodes(&self) -> Option<BTreeSet<Pubkey>>;

    fn node_cross_seckey(&self) -> Seckey;

    /// Daily election seed, derived from the node cross key
    fn election_seed(&self) -> [u8; 32] {
        blake3::derive_key(
            "uniledger election seed",
            &self.node_cross_seckey().to_bytes(),
        )
    }
}

/// [`SharedKeysReader`] over a fixed set of keys
#[derive(Clone)]
pub struct SharedKeys {
    emitter_cross_pubkeys: Vec<Pubkey>,
    authorized_nodes: Option<BTreeSet<Pubkey>>,
    node_cross_seckey: Seckey,
}

#[bon::bon]
impl SharedKeys {
    #[builder]
    pub fn new(
        #[builder(default)] emitter_cross_pubkeys: Vec<Pubkey>,
        authorized_nodes: Option<BTreeSet<Pubkey>>,
        node_cross_seckey: Seckey,
    ) -> Self {
        Self {
            emitter_cross_pubkeys,
            authorized_nodes,
            node_cross_seckey,
        }
    }
}

impl SharedKeysReader for SharedKeys {
    fn emitter_cross_pubkeys(&self) -> Vec<Pubkey> {
        self.emitter_cross_pubkeys.clone()
    }

    fn authorized_nodes(&self) -> Option<BTreeSet<Pubkey>> {
        self.authorized_nodes.clone()
    }

    fn node_cross_seckey(&self) -> Seckey {
        self.node_cross_seckey
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_seed_depends_only_on_node_cross_key() {
        let node_cross_seckey = Seckey::generate();
        let a = SharedKeys::builder()
            .node_cross_seckey(node_cross_seckey)
            .build();
        let b = SharedKeys::builder()
            .node_cross_seckey(node_cross_seckey)
            .emitter_cross_pubkeys(vec![Seckey::generate().pubkey()])
            .build();
        let c = SharedKeys::builder()
            .node_cross_seckey(Seckey::generate())
            .build();

        assert_eq!(a.election_seed(), b.election_seed());
        assert_ne!(a.election_seed(), c.election_seed());
    }
}
