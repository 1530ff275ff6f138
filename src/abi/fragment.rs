//! Function and event ABI fragments.

use super::{
    codec::{self, DecodingError, EncodingError},
    param::{Param, ParamType, ParseParamError},
    value::Value,
};
use crate::crypto::{keccak256, H256};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::{fmt::Write as _, str::FromStr};

/// An entry in a contract's JSON ABI.
///
/// Only functions and events are represented, other JSON ABI entries
/// (constructors, fallbacks, errors) are skipped when parsing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Fragment {
    Function(Function),
    Event(Event),
}

impl Fragment {
    /// Returns the fragment as a function, if it is one.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            Self::Event(_) => None,
        }
    }
}

/// A contract function interface.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<Param>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<String>,
}

impl Function {
    /// Creates a new function interface.
    pub fn new(name: impl Into<String>, inputs: Vec<Param>, outputs: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            state_mutability: None,
        }
    }

    /// Parses a function interface from a human readable signature, like
    /// `transfer(address,uint256)`. Parameters are left unnamed.
    pub fn from_signature(signature: &str) -> Result<Self, ParseParamError> {
        let invalid = || ParseParamError(signature.to_owned());
        let open = signature.find('(').ok_or_else(invalid)?;
        let (name, params) = signature.split_at(open);
        if name.is_empty() {
            return Err(invalid());
        }

        let inputs = match params.parse()? {
            ParamType::Tuple(types) => types,
            _ => return Err(invalid()),
        };
        Ok(Self::new(
            name,
            inputs.into_iter().map(|kind| Param::new("", kind)).collect(),
            Vec::new(),
        ))
    }

    /// Returns the canonical signature of the function used for computing
    /// its selector.
    pub fn signature(&self) -> String {
        format_signature(&self.name, &self.inputs)
    }

    /// Returns the 4-byte selector identifying the function in call data.
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature());
        [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
    }

    /// Returns the function's input types.
    pub fn input_types(&self) -> Vec<ParamType> {
        self.inputs.iter().map(|param| param.kind.clone()).collect()
    }

    /// Returns the function's output types.
    pub fn output_types(&self) -> Vec<ParamType> {
        self.outputs.iter().map(|param| param.kind.clone()).collect()
    }

    /// Encodes call data for this function with the specified arguments.
    pub fn encode_call(&self, args: &[Value]) -> Result<Vec<u8>, EncodingError> {
        let encoded = codec::encode(&self.input_types(), args)?;
        let mut data = Vec::with_capacity(4 + encoded.len());
        data.extend_from_slice(&self.selector());
        data.extend(encoded);
        Ok(data)
    }

    /// Decodes the arguments of call data for this function.
    ///
    /// Returns `None` when the call data is not for this function, which is
    /// expected when the interface describing call data is unknown or wrong.
    pub fn decode_call(&self, data: &[u8]) -> Option<Vec<Value>> {
        if data.len() < 4 {
            return None;
        }
        let (selector, args) = data.split_at(4);
        if selector != self.selector() {
            return None;
        }

        match codec::decode(&self.input_types(), args) {
            Ok(values) => Some(values),
            Err(err) => {
                tracing::debug!(?err, function = %self.signature(), "malformed call data");
                None
            }
        }
    }

    /// Decodes return data from a call to this function.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Value>, DecodingError> {
        codec::decode(&self.output_types(), data)
    }

    /// Converts JSON arguments into typed values for this function.
    pub fn args_from_json(&self, args: &[Json]) -> Result<Vec<Value>, EncodingError> {
        Value::from_json_list(&self.input_types(), args)
    }

    /// Formats a call to this function with the specified arguments, like
    /// `transfer(0x4242…, 1000)`.
    pub fn format_call(&self, args: &[Value]) -> String {
        let mut call = format!("{}(", self.name);
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                call.push_str(", ");
            }
            let _ = write!(call, "{arg}");
        }
        call.push(')');
        call
    }
}

/// A contract event interface.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub anonymous: bool,
}

impl Event {
    /// Creates a new non-anonymous event interface.
    pub fn new(name: impl Into<String>, inputs: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            inputs,
            anonymous: false,
        }
    }

    /// Returns the canonical signature of the event.
    pub fn signature(&self) -> String {
        format_signature(&self.name, &self.inputs)
    }

    /// Returns the first log topic for the event.
    pub fn topic(&self) -> H256 {
        keccak256(self.signature())
    }

    /// Decodes the parameters of a log emitted for this event.
    ///
    /// Indexed parameters that are not value types are only available as the
    /// hash stored in their topic, and are returned as 32 fixed bytes.
    pub fn decode_log(&self, topics: &[H256], data: &[u8]) -> Result<Vec<Value>, DecodingError> {
        let mut topics = topics.iter();
        if !self.anonymous && topics.next() != Some(&self.topic()) {
            return Err(DecodingError::Invalid(format!("{} topic", self.name)));
        }

        let data_types = self
            .inputs
            .iter()
            .filter(|param| !param.indexed)
            .map(|param| param.kind.clone())
            .collect::<Vec<_>>();
        let mut data_values = codec::decode(&data_types, data)?.into_iter();

        self.inputs
            .iter()
            .map(|param| {
                if !param.indexed {
                    return data_values.next().ok_or(DecodingError::OutOfBounds);
                }
                let topic = topics.next().ok_or(DecodingError::OutOfBounds)?;
                if param.kind.is_value_type() {
                    let mut values = codec::decode(&[param.kind.clone()], topic.as_bytes())?;
                    values.pop().ok_or(DecodingError::OutOfBounds)
                } else {
                    Ok(Value::FixedBytes(topic.0.to_vec()))
                }
            })
            .collect()
    }
}

fn format_signature(name: &str, params: &[Param]) -> String {
    let types = params.iter().map(|param| param.kind.clone()).collect();
    format!("{name}{}", ParamType::Tuple(types))
}

impl FromStr for Fragment {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entry = serde_json::from_str::<Json>(s)?;
        default_type(&mut entry);
        serde_json::from_value(entry)
    }
}

/// Entries without a `type` are functions, as per the JSON ABI format.
fn default_type(entry: &mut Json) -> Option<&str> {
    entry
        .as_object_mut()?
        .entry("type")
        .or_insert_with(|| Json::String("function".to_owned()))
        .as_str()
}

/// Parses a JSON ABI, keeping only its function and event entries.
pub fn parse_abi(json: &str) -> Result<Vec<Fragment>, serde_json::Error> {
    let entries = serde_json::from_str::<Vec<Json>>(json)?;
    entries
        .into_iter()
        .filter_map(|mut entry| {
            let supported = matches!(default_type(&mut entry), Some("function" | "event"));
            supported.then_some(entry)
        })
        .map(serde_json::from_value)
        .collect()
}

/// Finds the function in an ABI with the specified selector.
pub fn find_function(abi: &[Fragment], selector: [u8; 4]) -> Option<&Function> {
    abi.iter()
        .filter_map(Fragment::as_function)
        .find(|function| function.selector() == selector)
}
