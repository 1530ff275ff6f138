//! Signing with an account managed by a remote Ethereum node.

use super::Signing;
use crate::{
    address::Address,
    crypto::{Signature, H256},
    node::{method::eth, Remote},
    serialization::Bytes,
};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A signer using `eth_sign` on a node that holds the keyholder account.
pub struct NodeSigner {
    remote: Arc<Remote>,
    account: Option<Address>,
}

impl NodeSigner {
    /// Creates a signer for the specified node account, or the first account
    /// of the node when unspecified.
    pub fn new(remote: Arc<Remote>, account: Option<Address>) -> Self {
        Self { remote, account }
    }
}

#[async_trait]
impl Signing for NodeSigner {
    async fn address(&self) -> Result<Address> {
        if let Some(account) = self.account {
            return Ok(account);
        }
        let accounts = self.remote.execute(eth::Accounts, ()).await?;
        accounts
            .first()
            .copied()
            .context("remote node does not manage any accounts")
    }

    async fn sign_message(&self, hash: H256) -> Result<Signature> {
        let account = self.address().await?;
        let signature = self
            .remote
            .execute(eth::Sign, (account, Bytes(hash.0.to_vec())))
            .await?;
        Ok(signature)
    }
}
