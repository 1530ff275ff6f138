//! Off-chain signature aggregation and publication for MetaMultisig wallets.
//!
//! A [`request::SigningRequest`] describes a proposed call from the multisig.
//! Keyholders sign its canonical hash off-chain, [`status`] recovers and
//! weighs those signatures against on-chain state, and the
//! [`orchestrator`] decides when the fully signed call gets submitted.

pub mod abi;
pub mod address;
pub mod chain;
pub mod crypto;
pub mod jsonrpc;
pub mod keyholders;
pub mod multisig;
pub mod node;
pub mod orchestrator;
pub mod request;
pub mod serialization;
pub mod service;
pub mod signer;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;
