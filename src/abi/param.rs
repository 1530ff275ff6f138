//! ABI parameter types.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// A Solidity ABI type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ParamType {
    Address,
    Bool,
    /// Unsigned integer with the specified bit size.
    Uint(usize),
    /// Signed integer with the specified bit size.
    Int(usize),
    /// Fixed size byte array with the specified length.
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Returns `true` if values of this type are encoded out-of-place.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_dynamic(),
            Self::Tuple(types) => types.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Returns the number of bytes a value of this type occupies in the head
    /// of an encoded tuple.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            Self::FixedArray(inner, size) => inner.head_size().saturating_mul(*size),
            Self::Tuple(types) => types
                .iter()
                .map(Self::head_size)
                .fold(0, usize::saturating_add),
            _ => 32,
        }
    }

    /// Returns `true` for elementary types whose values fit in a single word.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Self::Address | Self::Bool | Self::Uint(_) | Self::Int(_) | Self::FixedBytes(_)
        )
    }

    /// Wraps a type in the array suffixes of a type string, such as `[2][]`.
    fn with_array_suffix(self, mut suffix: &str) -> Result<Self, ParseParamError> {
        let mut kind = self;
        while !suffix.is_empty() {
            let (size, rest) = suffix
                .strip_prefix('[')
                .and_then(|s| s.split_once(']'))
                .ok_or_else(|| ParseParamError(suffix.to_owned()))?;
            kind = if size.is_empty() {
                Self::Array(Box::new(kind))
            } else {
                let size = size
                    .parse()
                    .map_err(|_| ParseParamError(suffix.to_owned()))?;
                Self::FixedArray(Box::new(kind), size)
            };
            suffix = rest;
        }
        Ok(kind)
    }

    /// Splits a type into its innermost non-array element type and the array
    /// suffix wrapping it.
    fn split_array_suffix(&self) -> (&Self, String) {
        match self {
            Self::Array(inner) => {
                let (base, suffix) = inner.split_array_suffix();
                (base, suffix + "[]")
            }
            Self::FixedArray(inner, size) => {
                let (base, suffix) = inner.split_array_suffix();
                (base, format!("{suffix}[{size}]"))
            }
            other => (other, String::new()),
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::FixedBytes(size) => write!(f, "bytes{size}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::FixedArray(inner, size) => write!(f, "{inner}[{size}]"),
            Self::Tuple(types) => {
                f.write_str("(")?;
                for (i, kind) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{kind}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl FromStr for ParamType {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseParamError(s.to_owned());
        let s = s.trim();

        // Array suffixes bind last, `uint8[2][]` is a dynamic array of
        // `uint8[2]` elements.
        if let Some(inner) = s.strip_suffix(']') {
            let open = inner.rfind('[').ok_or_else(invalid)?;
            let element = inner[..open].parse()?;
            return Self::with_array_suffix(element, &s[open..]);
        }

        if let Some(inner) = s.strip_prefix('(') {
            let inner = inner.strip_suffix(')').ok_or_else(invalid)?;
            return split_components(inner)
                .ok_or_else(invalid)?
                .into_iter()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map(Self::Tuple);
        }

        match s {
            "address" => Ok(Self::Address),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "uint" => Ok(Self::Uint(256)),
            "int" => Ok(Self::Int(256)),
            _ => {
                let bits = |n: usize| n > 0 && n <= 256 && n % 8 == 0;
                if let Some(digits) = s.strip_prefix("uint") {
                    parse_size(digits, bits).map(Self::Uint).ok_or_else(invalid)
                } else if let Some(digits) = s.strip_prefix("int") {
                    parse_size(digits, bits).map(Self::Int).ok_or_else(invalid)
                } else if let Some(digits) = s.strip_prefix("bytes") {
                    parse_size(digits, |n| n > 0 && n <= 32)
                        .map(Self::FixedBytes)
                        .ok_or_else(invalid)
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

/// Parses the size suffix of a sized elementary type like `uint64`.
fn parse_size(digits: &str, valid: impl Fn(usize) -> bool) -> Option<usize> {
    if digits.starts_with('0') {
        return None;
    }
    digits.parse().ok().filter(|&size| valid(size))
}

/// Splits the components of a tuple type string on top-level commas.
fn split_components(s: &str) -> Option<Vec<&str>> {
    if s.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut components = Vec::new();
    let (mut depth, mut start) = (0_usize, 0);
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                components.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    components.push(&s[start..]);

    Some(components)
}

/// A named parameter of a function or event.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "RawParam", into = "RawParam")]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
    /// Whether or not the parameter is stored in a log topic. Only meaningful
    /// for event parameters.
    pub indexed: bool,
    /// Named tuple components, kept so that JSON ABIs round-trip.
    pub components: Vec<Param>,
}

impl Param {
    /// Creates a new unindexed parameter.
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            indexed: false,
            components: Vec::new(),
        }
    }

    /// Creates a new indexed event parameter.
    pub fn indexed(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            indexed: true,
            ..Self::new(name, kind)
        }
    }
}

/// JSON ABI representation of a parameter.
#[derive(Deserialize, Serialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    components: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    indexed: Option<bool>,
}

impl TryFrom<RawParam> for Param {
    type Error = ParseParamError;

    fn try_from(raw: RawParam) -> Result<Self, Self::Error> {
        let kind = match raw.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let tuple = ParamType::Tuple(raw.components.iter().map(|c| c.kind.clone()).collect());
                tuple.with_array_suffix(suffix)?
            }
            None => raw.kind.parse()?,
        };

        Ok(Self {
            name: raw.name,
            kind,
            indexed: raw.indexed.unwrap_or_default(),
            components: raw.components,
        })
    }
}

impl From<Param> for RawParam {
    fn from(param: Param) -> Self {
        let (base, suffix) = param.kind.split_array_suffix();
        let (kind, components) = match base {
            ParamType::Tuple(types) => {
                let components = if param.components.is_empty() {
                    types
                        .iter()
                        .map(|kind| Param::new("", kind.clone()))
                        .collect()
                } else {
                    param.components
                };
                (format!("tuple{suffix}"), components)
            }
            _ => (param.kind.to_string(), Vec::new()),
        };

        Self {
            name: param.name,
            kind,
            components,
            indexed: param.indexed.then_some(true),
        }
    }
}

/// An invalid ABI type string.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("invalid ABI parameter type '{0}'")]
pub struct ParseParamError(pub String);
