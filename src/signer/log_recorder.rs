//! A signer that just logs all signing operations.

use super::Signing;
use crate::{
    address::Address,
    crypto::{Signature, H256},
};
use anyhow::Result;
use async_trait::async_trait;

/// Wrapping signer that logs all signing operations to the global logger.
pub struct LogRecorder<S>(pub S);

#[async_trait]
impl<S> Signing for LogRecorder<S>
where
    S: Signing,
{
    async fn address(&self) -> Result<Address> {
        self.0.address().await
    }

    async fn sign_message(&self, hash: H256) -> Result<Signature> {
        let signature = self.0.sign_message(hash).await?;
        match signature.recover(hash) {
            Ok(account) => tracing::info!(%account, %hash, %signature, "signed message"),
            Err(err) => tracing::warn!(%err, %hash, %signature, "signed message is unrecoverable"),
        }
        Ok(signature)
    }
}
