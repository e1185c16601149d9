use uniledger_core::hash::TxHash;
use uniledger_core::keys::Pubkey;

/// Deterministic, unpredictable permutation of candidate keys
///
/// Implementations must return a permutation of `keys` that depends only on
/// the arguments.
pub trait EntropySort {
    fn sort(&self, tx_hash: TxHash, keys: &[Pubkey], seed: &[u8; 32]) -> Vec<Pubkey>;
}

/// Order keys by their blake3 digest keyed with the seed
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3EntropySort;

impl EntropySort for Blake3EntropySort {
    fn sort(&self, tx_hash: TxHash, keys: &[Pubkey], seed: &[u8; 32]) -> Vec<Pubkey> {
        let mut scored: Vec<([u8; 32], Pubkey)> = keys
            .iter()
            .map(|key| {
                let mut hasher = blake3::Hasher::new_keyed(seed);
                hasher.update(tx_hash.as_slice());
                hasher.update(key.as_slice());
                (*hasher.finalize().as_bytes(), *key)
            })
            .collect();
        scored.sort_unstable();
        scored.into_iter().map(|(_, key)| key).collect()
    }
}
