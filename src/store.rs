//! Persistence of signing requests.
//!
//! The store is a list of request records per multisig. It does not judge
//! signatures beyond their encoding, weights are only checked when computing
//! a request's status.

use crate::{
    address::Address,
    crypto::{InvalidSignatureEncoding, Signature, H256},
    request::{RequestError, SigningRequest, SigningRequestRecord},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;

/// Storage backend for signing requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Lists the pending requests of a multisig.
    async fn list(&self, multisig: Address) -> Result<Vec<SigningRequestRecord>, StoreError>;

    /// Gets a single request.
    async fn get(&self, multisig: Address, id: H256) -> Result<SigningRequestRecord, StoreError>;

    /// Stores a new request.
    async fn create(
        &self,
        multisig: Address,
        record: SigningRequestRecord,
    ) -> Result<SigningRequestRecord, StoreError>;

    /// Adds a signature to a request, replacing an earlier signature by the
    /// same signer.
    async fn add_signature(
        &self,
        multisig: Address,
        id: H256,
        signature: &[u8],
    ) -> Result<SigningRequestRecord, StoreError>;
}

type Requests = HashMap<Address, Vec<SigningRequestRecord>>;

/// A request store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: Mutex<Requests>,
}

impl MemoryStore {
    fn with_requests<T>(&self, f: impl FnOnce(&mut Requests) -> T) -> T {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut requests)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn list(&self, multisig: Address) -> Result<Vec<SigningRequestRecord>, StoreError> {
        Ok(self.with_requests(|requests| requests.get(&multisig).cloned().unwrap_or_default()))
    }

    async fn get(&self, multisig: Address, id: H256) -> Result<SigningRequestRecord, StoreError> {
        self.with_requests(|requests| {
            requests
                .get(&multisig)
                .and_then(|records| records.iter().find(|record| record.id == id))
                .cloned()
                .ok_or(StoreError::NotFound(id))
        })
    }

    async fn create(
        &self,
        multisig: Address,
        record: SigningRequestRecord,
    ) -> Result<SigningRequestRecord, StoreError> {
        self.with_requests(|requests| {
            let records = requests.entry(multisig).or_default();
            if records.iter().any(|existing| existing.id == record.id) {
                return Err(StoreError::Duplicate(record.id));
            }
            records.push(record.clone());
            tracing::debug!(%multisig, id = %record.id, "created signing request");
            Ok(record)
        })
    }

    async fn add_signature(
        &self,
        multisig: Address,
        id: H256,
        signature: &[u8],
    ) -> Result<SigningRequestRecord, StoreError> {
        let signature = Signature::from_slice(signature)?;
        self.with_requests(|requests| -> Result<_, StoreError> {
            let record = requests
                .get_mut(&multisig)
                .and_then(|records| records.iter_mut().find(|record| record.id == id))
                .ok_or(StoreError::NotFound(id))?;

            // Record identifiers are the canonical hash that gets signed.
            let mut request = SigningRequest::try_from(record.clone())?;
            let signer = request.merge_signature(id, signature)?;
            *record = SigningRequestRecord::new(id, &request)?;

            tracing::debug!(%multisig, %id, %signer, "added signature");
            Ok(record.clone())
        })
    }
}

/// An error accessing the request store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signing request {0} not found")]
    NotFound(H256),
    #[error("signing request {0} already exists")]
    Duplicate(H256),
    #[error(transparent)]
    InvalidSignature(#[from] InvalidSignatureEncoding),
    #[error(transparent)]
    Request(#[from] RequestError),
}
