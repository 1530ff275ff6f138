//! Read and submission access to a deployed MetaMultisig contract.

pub mod remote;

use crate::{address::Address, crypto::H256};
use async_trait::async_trait;
use ethnum::U256;
use thiserror::Error;

/// A view onto the on-chain state of a single multisig contract.
///
/// Keyholder weights and the threshold are mutable contract state, so
/// implementations must not cache them.
#[async_trait]
pub trait ChainView: Send + Sync {
    /// Returns the address of the multisig contract.
    fn multisig(&self) -> Address;

    /// Returns the current signing weight of a keyholder, zero for accounts
    /// that are not keyholders.
    async fn weight(&self, keyholder: Address) -> Result<U256, ChainError>;

    /// Returns the current signing threshold.
    async fn threshold(&self) -> Result<U256, ChainError>;

    /// Returns the hash the contract verifies signatures against for the
    /// specified call.
    async fn transaction_hash(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
    ) -> Result<H256, ChainError>;

    /// Submits a signed call to the contract, returning the hash of the
    /// submitted transaction.
    async fn submit(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
        signatures: &[Vec<u8>],
    ) -> Result<H256, ChainError>;
}

/// An error reading from or submitting to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("contract call {method} failed: {source}")]
    Call {
        method: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("transaction submission failed: {0}")]
    Submit(#[source] anyhow::Error),
}

impl ChainError {
    /// Creates an error for a failed contract read.
    pub fn call(method: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Call {
            method: method.into(),
            source: source.into(),
        }
    }
}
