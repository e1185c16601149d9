use bincode::{Decode, Encode};
use uniledger_util_array_type::{
    array_type_define, array_type_impl_debug_as_display, array_type_impl_hex_str,
    array_type_impl_rand, array_type_impl_zero_default,
};

use crate::keys::Pubkey;

array_type_define! {
    /// Content digest of a [`crate::transaction::Transaction`]
    #[derive(Encode, Decode, Copy, Clone, Hash)]
    pub struct TxHash[32];
}
array_type_impl_zero_default!(TxHash);
array_type_impl_hex_str!(TxHash);
array_type_impl_debug_as_display!(TxHash);
array_type_impl_rand!(TxHash);

array_type_define! {
    /// Address of a transaction chain
    ///
    /// A digest, usually of the public key owning the chain.
    #[derive(Encode, Decode, Copy, Clone, Hash)]
    pub struct TxAddress[32];
}
array_type_impl_zero_default!(TxAddress);
array_type_impl_hex_str!(TxAddress);
array_type_impl_debug_as_display!(TxAddress);
array_type_impl_rand!(TxAddress);

impl TxHash {
    /// Well-formed digests are never all zeroes
    pub fn is_well_formed(&self) -> bool {
        !self.is_zero()
    }
}

impl TxAddress {
    pub fn from_pubkey(pubkey: Pubkey) -> Self {
        blake3::hash(pubkey.as_slice()).into()
    }

    pub fn is_well_formed(&self) -> bool {
        !self.is_zero()
    }
}

impl From<blake3::Hash> for TxHash {
    fn from(value: blake3::Hash) -> Self {
        Self(*value.as_bytes())
    }
}

impl From<blake3::Hash> for TxAddress {
    fn from(value: blake3::Hash) -> Self {
        Self(*value.as_bytes())
    }
}
