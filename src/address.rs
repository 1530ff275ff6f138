//! Ethereum account addresses.

use crate::crypto::keccak256;
use k256::{ecdsa::VerifyingKey, elliptic_curve::sec1::ToEncodedPoint as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// A 160-bit Ethereum account address.
///
/// Addresses are displayed with their EIP-55 mixed-case checksum.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Computes the address of the account controlled by a public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.as_affine().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);

        let mut address = [0; 20];
        address.copy_from_slice(&hash.0[12..]);
        Self(address)
    }

    /// Returns the EIP-55 checksummed hex representation of the address,
    /// without the `0x` prefix.
    fn checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(&lower);

        lower
            .char_indices()
            .map(|(i, c)| {
                let nibble = (hash.0[i / 2] >> (4 * (1 - i % 2))) & 0xf;
                if nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", self.checksum())
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(ParseAddressError::Prefix)?;
        let mut address = [0; 20];
        hex::decode_to_slice(digits, &mut address).map_err(|_| ParseAddressError::Hex)?;
        let address = Self(address);

        // Only mixed-case addresses carry a checksum.
        let mixed = digits.chars().any(|c| c.is_ascii_lowercase())
            && digits.chars().any(|c| c.is_ascii_uppercase());
        if mixed && digits != address.checksum() {
            return Err(ParseAddressError::Checksum);
        }

        Ok(address)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An error parsing an address from a string.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseAddressError {
    #[error("address missing '0x' prefix")]
    Prefix,
    #[error("address must be 20 hex encoded bytes")]
    Hex,
    #[error("address checksum mismatch")]
    Checksum,
}
