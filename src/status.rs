//! Signature verification and weight aggregation.
//!
//! Signers are recovered from detached signatures over a request's canonical
//! hash and weighed with their current on-chain keyholder weight. Recovered
//! addresses are the deduplication key, so aggregating the same signatures
//! in any order, or with duplicates, always yields the same total.

use crate::{
    address::Address,
    chain::{ChainError, ChainView},
    crypto::{InvalidSignatureEncoding, Signature, H256},
    serialization::quantity,
};
use ethnum::U256;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A keyholder that signed a request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Signatory {
    pub address: Address,
    pub signature: Signature,
    #[serde(with = "quantity")]
    pub weight: U256,
}

/// A signature whose bytes could not be recovered to any signer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InvalidSignature {
    /// Position of the signature in the request's signature list.
    pub index: usize,
    #[serde(serialize_with = "display")]
    pub reason: InvalidSignatureEncoding,
}

/// The signing status of a request against current on-chain state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequestStatus {
    /// Signers with nonzero weight, keyed by address.
    pub signatories: BTreeMap<Address, Signatory>,
    #[serde(with = "quantity")]
    pub total_weight: U256,
    #[serde(with = "quantity")]
    pub threshold: U256,
    pub invalid: Vec<InvalidSignature>,
}

impl SigningRequestStatus {
    /// Returns `true` if the signatures collected so far meet the threshold.
    pub fn is_publishable(&self) -> bool {
        self.total_weight >= self.threshold
    }

    /// Returns `true` if the collected signatures together with `weight`
    /// more would meet the threshold.
    pub fn is_publishable_with(&self, weight: U256) -> bool {
        self.total_weight.saturating_add(weight) >= self.threshold
    }

    /// Returns the signatures of all signatories except `address`, ordered by
    /// signer address.
    pub fn signatures_excluding(&self, address: Address) -> Vec<Vec<u8>> {
        self.signatories
            .values()
            .filter(|signatory| signatory.address != address)
            .map(|signatory| signatory.signature.to_vec())
            .collect()
    }
}

/// Recovers the signer of each signature over `hash`.
///
/// When several signatures recover to the same signer, the last one is kept.
/// Malformed signatures are returned separately with their position.
pub fn recover_signatures(
    hash: H256,
    signatures: &[Vec<u8>],
) -> (BTreeMap<Address, Signature>, Vec<InvalidSignature>) {
    let mut signers = BTreeMap::new();
    let mut invalid = Vec::new();
    for (index, bytes) in signatures.iter().enumerate() {
        let recovered = Signature::from_slice(bytes)
            .and_then(|signature| Ok((signature.recover(hash)?, signature)));
        match recovered {
            Ok((address, signature)) => {
                signers.insert(address, signature);
            }
            Err(reason) => {
                tracing::debug!(index, %reason, "skipping malformed signature");
                invalid.push(InvalidSignature { index, reason });
            }
        }
    }
    (signers, invalid)
}

/// Tallies recovered signers against their weights.
///
/// Signers without weight, including former keyholders that were removed,
/// are left out.
pub fn tally(
    signers: BTreeMap<Address, Signature>,
    weights: &BTreeMap<Address, U256>,
    threshold: U256,
    invalid: Vec<InvalidSignature>,
) -> SigningRequestStatus {
    let signatories = signers
        .into_iter()
        .filter_map(|(address, signature)| {
            let weight = weights.get(&address).copied().unwrap_or_default();
            (weight != U256::ZERO).then_some((
                address,
                Signatory {
                    address,
                    signature,
                    weight,
                },
            ))
        })
        .collect::<BTreeMap<_, _>>();
    let total_weight = signatories
        .values()
        .fold(U256::ZERO, |total, signatory| {
            total.saturating_add(signatory.weight)
        });

    SigningRequestStatus {
        signatories,
        total_weight,
        threshold,
        invalid,
    }
}

/// Computes the status of a set of signatures over `hash` with current
/// weights and threshold read from the chain.
pub async fn aggregate<C>(
    hash: H256,
    signatures: &[Vec<u8>],
    chain: &C,
) -> Result<SigningRequestStatus, ChainError>
where
    C: ChainView + ?Sized,
{
    let (signers, invalid) = recover_signatures(hash, signatures);

    let mut weights = BTreeMap::new();
    for address in signers.keys() {
        weights.insert(*address, chain.weight(*address).await?);
    }
    let threshold = chain.threshold().await?;

    Ok(tally(signers, &weights, threshold, invalid))
}

fn display<S>(value: &InvalidSignatureEncoding, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}
