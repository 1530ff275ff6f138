//! Typed ABI values.

use super::{codec::EncodingError, param::ParamType};
use crate::{address::Address, serialization::parse_u256};
use ethnum::{I256, U256};
use serde_json::Value as Json;
use std::fmt::{self, Display, Formatter};

/// A value of some ABI type.
///
/// Fixed and dynamic arrays share the `Array` variant, the parameter type
/// determines how it gets encoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Returns a short name for the kind of value, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Bool(_) => "bool",
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::FixedBytes(_) => "fixed bytes",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Converts a JSON value into a value of the specified ABI type.
    ///
    /// Numbers may be passed as JSON numbers or as decimal or `0x` hex strings,
    /// addresses and byte arrays as `0x` hex strings.
    pub fn from_json(kind: &ParamType, json: &Json) -> Result<Self, EncodingError> {
        let mismatch = || EncodingError::TypeMismatch {
            expected: kind.to_string(),
            found: json_kind(json).to_owned(),
        };
        let out_of_range = || EncodingError::OutOfRange(kind.to_string());
        let hex = |s: &str| {
            s.strip_prefix("0x")
                .and_then(|digits| hex::decode(digits).ok())
                .ok_or_else(mismatch)
        };

        let value = match (kind, json) {
            (ParamType::Address, Json::String(s)) => {
                Self::Address(s.parse().map_err(|_| mismatch())?)
            }
            (ParamType::Bool, Json::Bool(b)) => Self::Bool(*b),
            (ParamType::Uint(_), Json::Number(n)) => {
                Self::Uint(U256::from(n.as_u64().ok_or_else(out_of_range)?))
            }
            (ParamType::Uint(_), Json::String(s)) => {
                Self::Uint(parse_u256(s).map_err(|_| mismatch())?)
            }
            (ParamType::Int(_), Json::Number(n)) => {
                Self::Int(I256::from(n.as_i64().ok_or_else(out_of_range)?))
            }
            (ParamType::Int(_), Json::String(s)) => Self::Int(parse_i256(s).ok_or_else(mismatch)?),
            (ParamType::FixedBytes(size), Json::String(s)) => {
                let bytes = hex(s)?;
                if bytes.len() != *size {
                    return Err(EncodingError::Length {
                        expected: *size,
                        found: bytes.len(),
                    });
                }
                Self::FixedBytes(bytes)
            }
            (ParamType::Bytes, Json::String(s)) => Self::Bytes(hex(s)?),
            (ParamType::String, Json::String(s)) => Self::String(s.clone()),
            (ParamType::Array(inner), Json::Array(items)) => Self::Array(
                items
                    .iter()
                    .map(|item| Self::from_json(inner, item))
                    .collect::<Result<_, _>>()?,
            ),
            (ParamType::FixedArray(inner, size), Json::Array(items)) => {
                if items.len() != *size {
                    return Err(EncodingError::Length {
                        expected: *size,
                        found: items.len(),
                    });
                }
                Self::Array(
                    items
                        .iter()
                        .map(|item| Self::from_json(inner, item))
                        .collect::<Result<_, _>>()?,
                )
            }
            (ParamType::Tuple(types), Json::Array(items)) => {
                Self::Tuple(Self::from_json_list(types, items)?)
            }
            _ => return Err(mismatch()),
        };

        Ok(value)
    }

    /// Converts a list of JSON values into values of the specified types.
    pub fn from_json_list(types: &[ParamType], items: &[Json]) -> Result<Vec<Self>, EncodingError> {
        if types.len() != items.len() {
            return Err(EncodingError::Length {
                expected: types.len(),
                found: items.len(),
            });
        }
        types
            .iter()
            .zip(items)
            .map(|(kind, item)| Self::from_json(kind, item))
            .collect()
    }

    /// Converts the value to JSON. Integers are represented as decimal
    /// strings so they never lose precision.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Address(address) => Json::String(address.to_string()),
            Self::Bool(b) => Json::Bool(*b),
            Self::Uint(n) => Json::String(n.to_string()),
            Self::Int(n) => Json::String(n.to_string()),
            Self::FixedBytes(bytes) | Self::Bytes(bytes) => {
                Json::String(format!("0x{}", hex::encode(bytes)))
            }
            Self::String(s) => Json::String(s.clone()),
            Self::Array(items) | Self::Tuple(items) => {
                Json::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let list = |f: &mut Formatter, items: &[Value], open, close| {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(close)
        };

        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::FixedBytes(bytes) | Self::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => list(f, items, "[", "]"),
            Self::Tuple(items) => list(f, items, "(", ")"),
        }
    }
}

fn parse_i256(s: &str) -> Option<I256> {
    match s.strip_prefix('-') {
        Some(digits) => parse_u256(digits)
            .ok()
            .filter(|n| *n <= U256::ONE << 255)
            .map(|n| I256::ZERO.wrapping_sub(n.as_i256())),
        None => parse_u256(s).ok().filter(|n| *n < U256::ONE << 255).map(U256::as_i256),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
