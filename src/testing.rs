//! In-memory collaborators for tests.

use crate::{
    address::Address,
    chain::{ChainError, ChainView},
    crypto::{hash_message, keccak256, Signature, H256},
    signer::Signing,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use ethnum::U256;
use k256::ecdsa::SigningKey;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A keyholder with a deterministic private key.
#[derive(Clone)]
pub struct Keyholder {
    key: SigningKey,
    pub address: Address,
}

impl Keyholder {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let address = Address::from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// Signs a hash as a personal message, with a `27`/`28` recovery byte.
    pub fn sign(&self, hash: H256) -> Signature {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash_message(hash.as_bytes()).as_bytes())
            .unwrap();
        let mut bytes = [0; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Signature(bytes)
    }
}

/// A submitted multisig call.
#[derive(Clone, Debug)]
pub struct Submission {
    pub destination: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub nonce: U256,
    pub signatures: Vec<Vec<u8>>,
    pub transaction: H256,
}

#[derive(Default)]
struct State {
    weights: HashMap<Address, U256>,
    threshold: U256,
    fail_calls: bool,
    fail_submissions: bool,
    submissions: Vec<Submission>,
}

/// A multisig contract kept in memory. Clones share the contract state.
#[derive(Clone)]
pub struct FakeChain {
    multisig: Address,
    state: Arc<Mutex<State>>,
}

impl FakeChain {
    pub fn new(multisig: Address) -> Self {
        Self {
            multisig,
            state: Default::default(),
        }
    }

    pub fn set_weight(&self, keyholder: Address, weight: u128) {
        self.state
            .lock()
            .unwrap()
            .weights
            .insert(keyholder, U256::new(weight));
    }

    pub fn set_threshold(&self, threshold: u128) {
        self.state.lock().unwrap().threshold = U256::new(threshold);
    }

    pub fn fail_calls(&self, fail: bool) {
        self.state.lock().unwrap().fail_calls = fail;
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submissions = fail;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// The transaction hash this fake contract computes. It only needs to
    /// bind all of the call's fields.
    pub fn local_hash(&self, destination: Address, value: U256, data: &[u8], nonce: U256) -> H256 {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&self.multisig.0);
        buffer.extend_from_slice(&destination.0);
        buffer.extend_from_slice(&value.to_be_bytes());
        buffer.extend_from_slice(&keccak256(data).0);
        buffer.extend_from_slice(&nonce.to_be_bytes());
        keccak256(buffer)
    }

    fn check(&self, method: &str) -> Result<(), ChainError> {
        if self.state.lock().unwrap().fail_calls {
            return Err(ChainError::call(method, anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainView for FakeChain {
    fn multisig(&self) -> Address {
        self.multisig
    }

    async fn weight(&self, keyholder: Address) -> Result<U256, ChainError> {
        self.check("keyholders")?;
        let state = self.state.lock().unwrap();
        Ok(state.weights.get(&keyholder).copied().unwrap_or_default())
    }

    async fn threshold(&self) -> Result<U256, ChainError> {
        self.check("threshold")?;
        Ok(self.state.lock().unwrap().threshold)
    }

    async fn transaction_hash(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
    ) -> Result<H256, ChainError> {
        self.check("getTransactionHash")?;
        Ok(self.local_hash(destination, value, data, nonce))
    }

    async fn submit(
        &self,
        destination: Address,
        value: U256,
        data: &[u8],
        nonce: U256,
        signatures: &[Vec<u8>],
    ) -> Result<H256, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submissions {
            return Err(ChainError::Submit(anyhow::anyhow!("execution reverted")));
        }

        let transaction = keccak256(state.submissions.len().to_be_bytes());
        state.submissions.push(Submission {
            destination,
            value,
            data: data.to_vec(),
            nonce,
            signatures: signatures.to_vec(),
            transaction,
        });
        Ok(transaction)
    }
}

/// A signer for a single in-memory keyholder.
pub struct FakeSigner {
    keyholder: Keyholder,
    failing: bool,
    on_sign: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FakeSigner {
    pub fn new(keyholder: Keyholder) -> Self {
        Self {
            keyholder,
            failing: false,
            on_sign: None,
        }
    }

    /// Makes the signer reject all signing requests.
    pub fn failing(self) -> Self {
        Self {
            failing: true,
            ..self
        }
    }

    /// Runs a hook while a signature is being produced.
    pub fn on_sign(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            on_sign: Some(Box::new(hook)),
            ..self
        }
    }
}

#[async_trait]
impl Signing for FakeSigner {
    async fn address(&self) -> Result<Address> {
        Ok(self.keyholder.address)
    }

    async fn sign_message(&self, hash: H256) -> Result<Signature> {
        if let Some(hook) = &self.on_sign {
            hook();
        }
        if self.failing {
            bail!("user rejected signing request");
        }
        Ok(self.keyholder.sign(hash))
    }
}
