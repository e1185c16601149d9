use core::fmt;

use bincode::{Decode, Encode};
use snafu::Snafu;
use uniledger_util_array_type::{
    array_type_define, array_type_impl_bytes_conv, array_type_impl_debug_as_display,
    array_type_impl_hex_str, array_type_impl_rand, array_type_impl_zero_default,
};

array_type_define! {
    /// Ed25519 public key of a node, a submitter or a shared key
    #[derive(Encode, Decode, Clone, Copy, Hash)]
    pub struct Pubkey[32];
}
array_type_impl_zero_default!(Pubkey);
array_type_impl_hex_str!(Pubkey);
array_type_impl_debug_as_display!(Pubkey);
array_type_impl_rand!(Pubkey);

impl Pubkey {
    pub fn to_short(self) -> PubkeyShort {
        PubkeyShort(self)
    }

    /// Does the key decode to a valid curve point
    pub fn is_well_formed(&self) -> bool {
        ed25519_dalek::VerifyingKey::try_from(*self).is_ok()
    }
}

pub struct PubkeyShort(Pubkey);

impl fmt::Display for PubkeyShort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}…{}",
            data_encoding::HEXLOWER.encode_display(&self.0.as_slice()[0..3]),
            data_encoding::HEXLOWER.encode_display(&self.0.as_slice()[29..32])
        ))
    }
}

#[derive(Debug, Snafu)]
pub struct InvalidPubkeyError;

impl TryFrom<Pubkey> for ed25519_dalek::VerifyingKey {
    type Error = InvalidPubkeyError;

    fn try_from(value: Pubkey) -> Result<Self, Self::Error> {
        ed25519_dalek::VerifyingKey::from_bytes(&value.0).map_err(|_| InvalidPubkeyError)
    }
}

array_type_define! {
    #[derive(Encode, Decode, Clone, Copy)]
    pub struct Seckey[32];
}

impl Seckey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()).to_bytes())
    }

    pub fn pubkey(self) -> Pubkey {
        Pubkey(
            ed25519_dalek::SigningKey::from(self)
                .verifying_key()
                .to_bytes(),
        )
    }
}

impl From<Seckey> for ed25519_dalek::SigningKey {
    fn from(value: Seckey) -> Self {
        ed25519_dalek::SigningKey::from_bytes(&value.0)
    }
}

array_type_impl_bytes_conv!(Seckey);
array_type_impl_zero_default!(Seckey);
array_type_impl_hex_str!(Seckey);

array_type_define! {
    #[derive(Encode, Decode, Copy, Clone, Hash)]
    pub struct Signature[64];
}
array_type_impl_zero_default!(Signature);
array_type_impl_hex_str!(Signature);
array_type_impl_debug_as_display!(Signature);

impl Signature {
    /// Zeroed signature marks a field that was never signed
    pub fn is_well_formed(&self) -> bool {
        !self.is_zero()
    }
}

impl From<Signature> for ed25519_dalek::Signature {
    fn from(value: Signature) -> Self {
        ed25519_dalek::Signature::from_bytes(&value.0)
    }
}
impl From<ed25519_dalek::Signature> for Signature {
    fn from(value: ed25519_dalek::Signature) -> Self {
        Self(value.to_bytes())
    }
}
