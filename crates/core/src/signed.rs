use std::io::Write as _;

use ed25519_dalek::ed25519::signature::SignerMut as _;
use snafu::{OptionExt as _, Snafu};

use crate::bincode::LEDGER_BINCODE_CONFIG;
use crate::keys::{Pubkey, Seckey, Signature};

#[derive(Debug, Snafu, PartialEq, Eq)]
pub struct InvalidSignatureError;

pub type InvalidSignatureResult<T> = Result<T, InvalidSignatureError>;

/// Anything with a canonical encoding, digested with blake3
pub trait Hashable: bincode::Encode {
    fn hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();

        bincode::encode_into_std_write(self, &mut hasher, LEDGER_BINCODE_CONFIG)
            .expect("Can't fail");

        hasher.finalize()
    }
}

/// A message that can be signed/verified by a [`Pubkey`] identity
pub trait Signable: Hashable {
    /// Unique tag preventing two different type of messages with the same
    /// encoding from conflicting with each other
    const TAG: [u8; 4];

    fn sign_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();

        hasher.write_all(b"unld").expect("Can't fail");
        hasher.write_all(&Self::TAG).expect("Can't fail");
        hasher
            .write_all(self.hash().as_bytes())
            .expect("Can't fail");

        hasher.finalize()
    }

    fn sign_with(&self, seckey: Seckey) -> Signature {
        let v = ed25519_dalek::SigningKey::from(seckey).sign(self.sign_hash().as_bytes());
        v.into()
    }

    fn verify_signature(&self, pubkey: Pubkey, sig: Signature) -> InvalidSignatureResult<()> {
        verify_hash_signature(self.sign_hash(), pubkey, sig)
    }
}

/// Verify `sig` over `hash`
///
/// Malformed public keys verify nothing.
pub fn verify_hash_signature(
    hash: blake3::Hash,
    pubkey: Pubkey,
    sig: Signature,
) -> InvalidSignatureResult<()> {
    ed25519_dalek::VerifyingKey::try_from(pubkey)
        .ok()
        .context(InvalidSignatureSnafu)?
        .verify_strict(hash.as_bytes(), &sig.into())
        .ok()
        .context(InvalidSignatureSnafu)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bincode::Encode;

    use super::{Hashable, InvalidSignatureError, Signable};
    use crate::keys::Seckey;

    #[derive(Encode)]
    struct Msg(u32);

    impl Hashable for Msg {}
    impl Signable for Msg {
        const TAG: [u8; 4] = *b"test";
    }

    #[derive(Encode)]
    struct OtherMsg(u32);

    impl Hashable for OtherMsg {}
    impl Signable for OtherMsg {
        const TAG: [u8; 4] = *b"othr";
    }

    #[test]
    fn sign_and_verify() {
        let seckey = Seckey::generate();
        let sig = Msg(1).sign_with(seckey);

        assert_eq!(Msg(1).verify_signature(seckey.pubkey(), sig), Ok(()));
        assert_eq!(
            Msg(2).verify_signature(seckey.pubkey(), sig),
            Err(InvalidSignatureError)
        );
        assert_eq!(
            Msg(1).verify_signature(Seckey::generate().pubkey(), sig),
            Err(InvalidSignatureError)
        );
    }

    #[test]
    fn tag_separates_same_encoding() {
        let seckey = Seckey::generate();
        let sig = Msg(7).sign_with(seckey);

        assert_eq!(Msg(7).hash(), OtherMsg(7).hash());
        assert!(OtherMsg(7).verify_signature(seckey.pubkey(), sig).is_err());
    }
}
