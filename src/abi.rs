//! Solidity contract ABI types and encoding.

pub mod codec;
pub mod fragment;
pub mod param;
pub mod value;

pub use self::{
    codec::{decode, encode, DecodingError, EncodingError},
    fragment::{find_function, parse_abi, Event, Fragment, Function},
    param::{Param, ParamType, ParseParamError},
    value::Value,
};
