//! Additional Ethereum RPC types.

use crate::{
    address::Address,
    crypto::H256,
    serialization::{Bytes, Quantity},
};
use ethnum::U256;
use serde::{Deserialize, Serialize, Serializer};

/// A block reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Block {
    /// The earliest block.
    Earliest,
    /// The latest block.
    Latest,
    /// The pending block.
    Pending,
    /// The specified block number.
    Number(u64),
}

impl Serialize for Block {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Earliest => serializer.serialize_str("earliest"),
            Self::Latest => serializer.serialize_str("latest"),
            Self::Pending => serializer.serialize_str("pending"),
            Self::Number(number) => Quantity(U256::from(*number)).serialize(serializer),
        }
    }
}

/// A message call executed without creating a transaction.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

/// A transaction to be signed and sent by the node.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    pub data: Bytes,
}

/// A log filter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: Block,
    pub to_block: Block,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Topics to match by position, `None` matches any topic.
    pub topics: Vec<Option<H256>>,
}

/// A log emitted by a contract.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<Quantity>,
    #[serde(default)]
    pub log_index: Option<Quantity>,
    #[serde(default)]
    pub removed: bool,
}
