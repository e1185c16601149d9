use bincode::{Decode, Encode};
use snafu::{ResultExt as _, Snafu};

use crate::geo_patch::PatchId;
use crate::keys::{Pubkey, Seckey, Signature};
use crate::signed::{Hashable, InvalidSignatureError, Signable};

/// A node as seen by whoever elected it
#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElectedNode {
    pub pubkey: Pubkey,
    pub is_unreachable: bool,
    pub is_coordinator: bool,
    pub patch: PatchId,
    pub is_healthy: bool,
}

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq, Default)]
pub struct ElectedNodes(pub Vec<ElectedNode>);

impl Hashable for ElectedNodes {}
impl Signable for ElectedNodes {
    const TAG: [u8; 4] = *b"elnd";
}

impl ElectedNodes {
    pub fn pubkeys(&self) -> impl Iterator<Item = Pubkey> + '_ {
        self.0.iter().map(|node| node.pubkey)
    }

    pub fn contains(&self, pubkey: Pubkey) -> bool {
        self.pubkeys().any(|p| p == pubkey)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Pool descriptor, signed by the node that ran the election
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ElectedNodeList {
    pub nodes: ElectedNodes,
    pub creator_pubkey: Pubkey,
    pub creator_signature: Signature,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum InvalidElectedNodeListError {
    #[snafu(display("Pool descriptor signed by {creator_pubkey} does not verify"))]
    InvalidCreatorSignature {
        creator_pubkey: Pubkey,
        source: InvalidSignatureError,
    },
}

impl ElectedNodeList {
    pub fn new_sign(nodes: ElectedNodes, seckey: Seckey) -> Self {
        Self {
            creator_signature: nodes.sign_with(seckey),
            creator_pubkey: seckey.pubkey(),
            nodes,
        }
    }

    pub fn verify(&self) -> Result<(), InvalidElectedNodeListError> {
        self.nodes
            .verify_signature(self.creator_pubkey, self.creator_signature)
            .context(InvalidCreatorSignatureSnafu {
                creator_pubkey: self.creator_pubkey,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(seckey: Seckey, patch: u16) -> ElectedNode {
        ElectedNode {
            pubkey: seckey.pubkey(),
            is_unreachable: false,
            is_coordinator: false,
            patch: PatchId::new(patch),
            is_healthy: true,
        }
    }

    #[test]
    fn elected_list_signature_covers_nodes() {
        let creator = Seckey::generate();
        let nodes = ElectedNodes(vec![node(Seckey::generate(), 1), node(Seckey::generate(), 2)]);
        let mut list = ElectedNodeList::new_sign(nodes, creator);
        assert_eq!(list.verify(), Ok(()));
        assert!(list.nodes.contains(list.nodes.0[1].pubkey));

        list.nodes.0[1].is_unreachable = true;
        assert!(list.verify().is_err());
    }
}
