//! Solidity ABI head/tail encoding.

use super::{param::ParamType, value::Value};
use crate::address::Address;
use ethnum::{I256, U256};
use thiserror::Error;

/// ABI encodes a list of values as a tuple of the specified types.
///
/// Fails if any value does not match its declared type, no partial encoding
/// is ever produced.
pub fn encode(types: &[ParamType], values: &[Value]) -> Result<Vec<u8>, EncodingError> {
    if types.len() != values.len() {
        return Err(EncodingError::Length {
            expected: types.len(),
            found: values.len(),
        });
    }

    let head_size = types
        .iter()
        .map(ParamType::head_size)
        .fold(0, usize::saturating_add);
    let mut head = Vec::new();
    let mut tail = Vec::new();
    for (kind, value) in types.iter().zip(values) {
        let encoded = encode_value(kind, value)?;
        if kind.is_dynamic() {
            head.extend_from_slice(&size_word(head_size + tail.len()));
            tail.extend(encoded);
        } else {
            head.extend(encoded);
        }
    }

    head.extend(tail);
    Ok(head)
}

/// ABI decodes a tuple of the specified types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>, DecodingError> {
    decode_tuple(types, data, 0)
}

fn encode_value(kind: &ParamType, value: &Value) -> Result<Vec<u8>, EncodingError> {
    let out_of_range = || EncodingError::OutOfRange(kind.to_string());

    let encoded = match (kind, value) {
        (ParamType::Address, Value::Address(address)) => {
            let mut word = [0; 32];
            word[12..].copy_from_slice(&address.0);
            word.to_vec()
        }
        (ParamType::Bool, Value::Bool(b)) => U256::from(*b as u8).to_be_bytes().to_vec(),
        (ParamType::Uint(bits), Value::Uint(n)) => {
            if *bits < 256 && (*n >> *bits as u32) != U256::ZERO {
                return Err(out_of_range());
            }
            n.to_be_bytes().to_vec()
        }
        (ParamType::Int(bits), Value::Int(n)) => {
            if *bits < 256 && !fits_signed(*n, *bits) {
                return Err(out_of_range());
            }
            n.to_be_bytes().to_vec()
        }
        (ParamType::FixedBytes(size), Value::FixedBytes(bytes)) => {
            if bytes.len() != *size {
                return Err(EncodingError::Length {
                    expected: *size,
                    found: bytes.len(),
                });
            }
            padded(bytes)
        }
        (ParamType::Bytes, Value::Bytes(bytes)) => dynamic_bytes(bytes),
        (ParamType::String, Value::String(s)) => dynamic_bytes(s.as_bytes()),
        (ParamType::Array(inner), Value::Array(items)) => {
            let mut encoded = size_word(items.len()).to_vec();
            encoded.extend(encode(&vec![(**inner).clone(); items.len()], items)?);
            encoded
        }
        (ParamType::FixedArray(inner, size), Value::Array(items)) => {
            if items.len() != *size {
                return Err(EncodingError::Length {
                    expected: *size,
                    found: items.len(),
                });
            }
            encode(&vec![(**inner).clone(); *size], items)?
        }
        (ParamType::Tuple(types), Value::Tuple(items)) => encode(types, items)?,
        _ => {
            return Err(EncodingError::TypeMismatch {
                expected: kind.to_string(),
                found: value.kind_name().to_owned(),
            })
        }
    };

    Ok(encoded)
}

fn decode_tuple(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Value>, DecodingError> {
    let mut offset = base;
    let mut values = Vec::with_capacity(types.len());
    for kind in types {
        let value = if kind.is_dynamic() {
            let pointer = read_size(data, offset)?;
            let at = base.checked_add(pointer).ok_or(DecodingError::OutOfBounds)?;
            decode_value(kind, data, at)?
        } else {
            decode_value(kind, data, offset)?
        };
        values.push(value);
        offset = offset.saturating_add(kind.head_size());
    }

    Ok(values)
}

fn decode_value(kind: &ParamType, data: &[u8], at: usize) -> Result<Value, DecodingError> {
    let invalid = || DecodingError::Invalid(kind.to_string());

    let value = match kind {
        ParamType::Address => {
            let word = read_word(data, at)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(invalid());
            }
            let mut address = [0; 20];
            address.copy_from_slice(&word[12..]);
            Value::Address(Address(address))
        }
        ParamType::Bool => match U256::from_be_bytes(read_word(data, at)?) {
            n if n == U256::ZERO => Value::Bool(false),
            n if n == U256::ONE => Value::Bool(true),
            _ => return Err(invalid()),
        },
        ParamType::Uint(bits) => {
            let n = U256::from_be_bytes(read_word(data, at)?);
            if *bits < 256 && (n >> *bits as u32) != U256::ZERO {
                return Err(invalid());
            }
            Value::Uint(n)
        }
        ParamType::Int(bits) => {
            let n = I256::from_be_bytes(read_word(data, at)?);
            if *bits < 256 && !fits_signed(n, *bits) {
                return Err(invalid());
            }
            Value::Int(n)
        }
        ParamType::FixedBytes(size) => Value::FixedBytes(read_word(data, at)?[..*size].to_vec()),
        ParamType::Bytes => Value::Bytes(read_dynamic_bytes(data, at)?.to_vec()),
        ParamType::String => Value::String(
            String::from_utf8(read_dynamic_bytes(data, at)?.to_vec()).map_err(|_| invalid())?,
        ),
        ParamType::Array(inner) => {
            let len = read_size(data, at)?;
            let start = at + 32;
            // Guard against lengths that could never fit in the data before
            // allocating for them.
            let min_size = len
                .checked_mul(inner.head_size().max(32))
                .ok_or(DecodingError::OutOfBounds)?;
            if data.len().saturating_sub(start) < min_size {
                return Err(DecodingError::OutOfBounds);
            }
            Value::Array(decode_tuple(&vec![(**inner).clone(); len], data, start)?)
        }
        ParamType::FixedArray(inner, size) => {
            let min_size = size
                .checked_mul(inner.head_size().max(32))
                .ok_or(DecodingError::OutOfBounds)?;
            if data.len().saturating_sub(at) < min_size {
                return Err(DecodingError::OutOfBounds);
            }
            Value::Array(decode_tuple(&vec![(**inner).clone(); *size], data, at)?)
        }
        ParamType::Tuple(types) => Value::Tuple(decode_tuple(types, data, at)?),
    };

    Ok(value)
}

fn fits_signed(n: I256, bits: usize) -> bool {
    let high = n >> (bits as u32 - 1);
    high == I256::ZERO || high == I256::new(-1)
}

fn size_word(size: usize) -> [u8; 32] {
    U256::from(size as u64).to_be_bytes()
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut padded = bytes.to_vec();
    padded.resize((bytes.len() + 31) / 32 * 32, 0);
    padded
}

fn dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut encoded = size_word(bytes.len()).to_vec();
    encoded.extend(padded(bytes));
    encoded
}

fn read_word(data: &[u8], at: usize) -> Result<[u8; 32], DecodingError> {
    let end = at.checked_add(32).ok_or(DecodingError::OutOfBounds)?;
    let word = data.get(at..end).ok_or(DecodingError::OutOfBounds)?;

    let mut result = [0; 32];
    result.copy_from_slice(word);
    Ok(result)
}

fn read_size(data: &[u8], at: usize) -> Result<usize, DecodingError> {
    let word = read_word(data, at)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(DecodingError::OutOfBounds);
    }

    let mut size = [0; 8];
    size.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(size)).map_err(|_| DecodingError::OutOfBounds)
}

fn read_dynamic_bytes(data: &[u8], at: usize) -> Result<&[u8], DecodingError> {
    let len = read_size(data, at)?;
    let start = at + 32;
    let end = start.checked_add(len).ok_or(DecodingError::OutOfBounds)?;
    data.get(start..end).ok_or(DecodingError::OutOfBounds)
}

/// Values that do not match the ABI types they are encoded as.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EncodingError {
    #[error("expected {expected} value but got {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("value out of range for {0}")]
    OutOfRange(String),
    #[error("expected {expected} values but got {found}")]
    Length { expected: usize, found: usize },
}

/// Data that is not a valid ABI encoding of the expected types.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DecodingError {
    #[error("ABI data out of bounds")]
    OutOfBounds,
    #[error("invalid ABI encoded {0} value")]
    Invalid(String),
}
