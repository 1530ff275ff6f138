//! An abstraction around the keyholder's signing capability.
//!
//! Keys are never handled by this crate. Signing is delegated to a wallet
//! or node that manages the keyholder account, and implementations can be
//! composed, for example to record every signature that gets produced.

pub mod log_recorder;
pub mod remote;

use crate::{
    address::Address,
    crypto::{Signature, H256},
};
use anyhow::Result;
use async_trait::async_trait;

/// A trait abstracting the signing of canonical request hashes.
#[async_trait]
pub trait Signing: Send + Sync {
    /// Returns the address of the keyholder account.
    async fn address(&self) -> Result<Address>;

    /// Signs a 32-byte hash as an Ethereum personal message.
    async fn sign_message(&self, hash: H256) -> Result<Signature>;
}

/// A boxed signer that is safe to send between threads.
pub type BoxSigner = Box<dyn Signing + 'static>;
