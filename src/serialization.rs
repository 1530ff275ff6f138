//! Module containing serialization helpers.

use ethnum::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    num::ParseIntError,
    ops::Deref,
    str::FromStr,
};

/// Dynamic byte array serialization methods.
pub mod bytes {
    use serde::{
        de::{self, Deserializer},
        ser::Serializer,
        Deserialize as _,
    };
    use std::borrow::Cow;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        let s = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("bytes missing '0x' prefix"))?;
        hex::decode(s).map_err(de::Error::custom)
    }
}

/// 256-bit unsigned integer serialization.
///
/// Integers are serialized as `0x`-prefixed hex quantities, as is expected by
/// Ethereum JSON RPC. Deserialization is more lenient and also accepts decimal
/// strings and JSON numbers.
pub mod quantity {
    use ethnum::U256;
    use serde::{
        de::{self, Deserializer},
        ser::Serializer,
        Deserialize,
    };

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            String(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(U256::from(value)),
            Repr::String(value) => super::parse_u256(&value).map_err(de::Error::custom),
        }
    }
}

/// Parses a 256-bit unsigned integer from either a `0x`-prefixed hex string or
/// a decimal string.
pub fn parse_u256(s: &str) -> Result<U256, ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    }
}

/// Dynamic byte array wrapper with `0x`-prefixed hex serialization.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct Bytes(pub Vec<u8>);

impl Debug for Bytes {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        bytes::deserialize(deserializer).map(Self)
    }
}

/// A 256-bit unsigned integer quantity.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Quantity(pub U256);

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        quantity::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        quantity::deserialize(deserializer).map(Self)
    }
}

/// A wrapper for types that serialize to and from strings through their
/// `Display` and `FromStr` implementations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Str<T>(pub T);

impl<T> Deref for Str<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Serialize for Str<T>
where
    T: Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de, T> Deserialize<'de> for Str<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map(Self).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes() {
        assert_eq!(
            serde_json::to_value(Bytes(vec![1, 3, 3, 7])).unwrap(),
            json!("0x01030307"),
        );
        assert_eq!(
            serde_json::from_value::<Bytes>(json!("0x")).unwrap(),
            Bytes(vec![]),
        );
        assert!(serde_json::from_value::<Bytes>(json!("01030307")).is_err());
    }

    #[test]
    fn quantities() {
        assert_eq!(
            serde_json::to_value(Quantity(U256::new(1_000_000_000_000_000_000))).unwrap(),
            json!("0xde0b6b3a7640000"),
        );
        assert_eq!(serde_json::to_value(Quantity(U256::ZERO)).unwrap(), json!("0x0"));
        for value in [json!("0x2a"), json!("42"), json!(42)] {
            assert_eq!(
                serde_json::from_value::<Quantity>(value).unwrap(),
                Quantity(U256::new(42)),
            );
        }
        assert!(serde_json::from_value::<Quantity>(json!("0xzz")).is_err());
        assert!(serde_json::from_value::<Quantity>(json!(-1)).is_err());
    }

    #[test]
    fn display_strings() {
        assert_eq!(
            serde_json::from_value::<Str<u32>>(json!("1337")).unwrap(),
            Str(1337),
        );
        assert_eq!(serde_json::to_value(Str(1337)).unwrap(), json!("1337"));
    }
}
