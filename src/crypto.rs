//! Ethereum hashing and ECDSA public key recovery.
//!
//! Signatures handled here are the detached 65-byte `r || s || v` signatures
//! produced by `eth_sign`-style personal message signing. No private key
//! material ever passes through this module.

use crate::address::Address;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest as _, Keccak256};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// Computes the Keccak-256 digest of some data.
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    H256(Keccak256::digest(data.as_ref()).into())
}

/// Computes the digest that gets signed for an Ethereum personal message.
///
/// This is `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn hash_message(message: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message);
    H256(hasher.finalize().into())
}

/// A 256-bit hash.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct H256(pub [u8; 32]);

impl H256 {
    /// Returns the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for H256 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for H256 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for H256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hash = [0; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut hash)?;
        Ok(Self(hash))
    }
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A recoverable ECDSA signature over the secp256k1 curve.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    /// Reads a signature from raw bytes, checking only its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidSignatureEncoding> {
        let bytes = bytes
            .try_into()
            .map_err(|_| InvalidSignatureEncoding::Length(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Recovers the address of the account that signed `hash` as a personal
    /// message.
    pub fn recover(&self, hash: H256) -> Result<Address, InvalidSignatureEncoding> {
        self.recover_prehash(hash_message(hash.as_bytes()))
    }

    /// Recovers the address of the account that signed the raw digest.
    pub fn recover_prehash(&self, digest: H256) -> Result<Address, InvalidSignatureEncoding> {
        let v = match self.0[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => return Err(InvalidSignatureEncoding::RecoveryByte(v)),
        };
        let recovery_id =
            RecoveryId::from_byte(v).ok_or(InvalidSignatureEncoding::RecoveryByte(v))?;
        let signature = EcdsaSignature::from_slice(&self.0[..64])
            .map_err(|_| InvalidSignatureEncoding::Scalars)?;
        let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &signature, recovery_id)
            .map_err(|_| InvalidSignatureEncoding::Unrecoverable)?;

        Ok(Address::from_verifying_key(&key))
    }

    /// Returns the signature bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Signature {
    type Err = InvalidSignatureEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|_| InvalidSignatureEncoding::Hex)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Signature bytes that do not encode a recoverable signature.
///
/// This is distinct from a well-formed signature by an account that holds no
/// weight in the multisig.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvalidSignatureEncoding {
    #[error("signature is not valid hex")]
    Hex,
    #[error("signature must be 65 bytes but is {0}")]
    Length(usize),
    #[error("invalid signature recovery byte {0}")]
    RecoveryByte(u8),
    #[error("signature scalars are out of range")]
    Scalars,
    #[error("no public key can be recovered from signature")]
    Unrecoverable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Keyholder;

    #[test]
    fn keccak_empty() {
        assert_eq!(
            keccak256(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        );
    }

    #[test]
    fn personal_message_hash() {
        assert_eq!(
            hash_message(b"Hello World").to_string(),
            "0xa1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2",
        );
    }

    #[test]
    fn recovers_signer() {
        let keyholder = Keyholder::new(1);
        let hash = keccak256(b"proposal");
        let signature = keyholder.sign(hash);

        assert_eq!(signature.recover(hash).unwrap(), keyholder.address);
    }

    #[test]
    fn recovers_with_zero_based_recovery_byte() {
        let keyholder = Keyholder::new(2);
        let hash = keccak256(b"proposal");
        let mut signature = keyholder.sign(hash);
        signature.0[64] -= 27;

        assert_eq!(signature.recover(hash).unwrap(), keyholder.address);
    }

    #[test]
    fn different_hash_recovers_different_address() {
        let keyholder = Keyholder::new(3);
        let signature = keyholder.sign(keccak256(b"proposal"));

        assert_ne!(
            signature.recover(keccak256(b"other")).ok(),
            Some(keyholder.address),
        );
    }

    #[test]
    fn malformed_signatures() {
        let hash = keccak256(b"proposal");
        assert_eq!(
            Signature::from_slice(&[0; 64]).unwrap_err(),
            InvalidSignatureEncoding::Length(64),
        );

        let mut signature = Keyholder::new(4).sign(hash);
        signature.0[64] = 29;
        assert_eq!(
            signature.recover(hash).unwrap_err(),
            InvalidSignatureEncoding::RecoveryByte(29),
        );

        assert_eq!(
            Signature([0; 65]).recover(hash).unwrap_err(),
            InvalidSignatureEncoding::Scalars,
        );
    }

    #[test]
    fn parse_and_display() {
        let signature = Keyholder::new(5).sign(keccak256(b"proposal"));
        let hex = signature.to_string();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.parse::<Signature>().unwrap(), signature);
        assert_eq!(
            "0x1234".parse::<Signature>().unwrap_err(),
            InvalidSignatureEncoding::Length(2),
        );
        assert_eq!(
            "0xzz".parse::<Signature>().unwrap_err(),
            InvalidSignatureEncoding::Hex,
        );
    }
}
