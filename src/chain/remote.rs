//! Chain view backed by a remote Ethereum node.

use super::{ChainError, ChainView};
use crate::{
    abi::{Function, Value},
    address::Address,
    crypto::H256,
    multisig,
    node::{
        method::eth,
        types::{Block, CallRequest, TransactionRequest},
        Remote,
    },
    serialization::Bytes,
};
use anyhow::anyhow;
use async_trait::async_trait;
use ethnum::U256;
use std::sync::Arc;

/// A MetaMultisig contract accessed through JSON RPC.
pub struct RemoteChain {
    remote: Arc<Remote>,
    multisig: Address,
    sender: Option<Address>,
}

impl RemoteChain {
    /// Creates a read-only view of a multisig contract.
    pub fn new(remote: Arc<Remote>, multisig: Address) -> Self {
        Self {
            remote,
            multisig,
            sender: None,
        }
    }

    /// Sets the node account submissions are sent from.
    pub fn with_sender(self, sender: Address) -> Self {
        Self {
            sender: Some(sender),
            ..self
        }
    }

    async fn call(&self, function: Function, args: &[Value]) -> Result<Vec<Value>, ChainError> {
        let fail = |err: anyhow::Error| ChainError::call(function.name.clone(), err);

        let data = function
            .encode_call(args)
            .map_err(|err| fail(err.into()))?;
        let output = self
            .remote
            .execute(
                eth::Call,
                (
                    CallRequest {
                        from: None,
                        to: self.multisig,
                        data: Bytes(data),
                    },
                    Block::Latest,
                ),
            )
            .await
            .map_err(|err| fail(err.into()))?;

        function.decode_output(&output).map_err(|err| fail(err.into()))
    }

    async fn call_uint(&self, function: Function, args: &[Value]) -> Result<U256, ChainError> {
        let name = function.name.clone();
        match self.call(function, args).await?.as_slice() {
            [Value::Uint(value)] => Ok(*value),
            other => Err(ChainError::call(
                name,
                anyhow!("unexpected return values {other:?}"),
            )),
        }
    }
}

#[async_trait]
impl ChainView for RemoteChain {
    fn multisig(&self) -> Address {
        self.multisig
    }

    async fn weight(&self, keyholder: Address) -> Result<U256, ChainError> {
        self.call_uint(multisig::keyholders(), &[Value::Address(keyholder)])
            .await
    }

    async fn threshold(&self) -> Result<U256, ChainError> {
        self.call_uint(multisig::threshold(), &[]).await
    }

    async fn transaction_hash(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
    ) -> Result<H256, ChainError> {
        let function = multisig::get_transaction_hash();
        let name = function.name.clone();
        let args = [
            Value::Address(destination),
            Value::Uint(value),
            Value::Bytes(data.to_vec()),
            Value::Uint(nonce),
        ];

        match self.call(function, &args).await?.as_slice() {
            [Value::FixedBytes(hash)] => {
                let hash = hash
                    .as_slice()
                    .try_into()
                    .map_err(|_| ChainError::call(name, anyhow!("invalid hash length")))?;
                Ok(H256(hash))
            }
            other => Err(ChainError::call(
                name,
                anyhow!("unexpected return values {other:?}"),
            )),
        }
    }

    async fn submit(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
        signatures: &[Vec<u8>],
    ) -> Result<H256, ChainError> {
        let sender = self
            .sender
            .ok_or_else(|| ChainError::Submit(anyhow!("no sender account configured")))?;
        let data = multisig::submit()
            .encode_call(&[
                Value::Address(destination),
                Value::Uint(value),
                Value::Bytes(data.to_vec()),
                Value::Uint(nonce),
                Value::Array(signatures.iter().cloned().map(Value::Bytes).collect()),
            ])
            .map_err(|err| ChainError::Submit(err.into()))?;

        self.remote
            .execute(
                eth::SendTransaction,
                (TransactionRequest {
                    from: sender,
                    to: self.multisig,
                    value: None,
                    data: Bytes(data),
                },),
            )
            .await
            .map_err(|err| ChainError::Submit(err.into()))
    }
}
