//! Keyholder registry built from `KeyholderChanged` contract logs.

use crate::{
    abi::{DecodingError, Event, Value},
    address::Address,
    crypto::H256,
    multisig,
    node::{
        method::eth,
        types::{Block, Log, LogFilter},
        Remote, RemoteError,
    },
};
use ethnum::U256;
use std::collections::{BTreeMap, HashMap};

/// Current keyholder weights of every multisig seen in logs.
#[derive(Debug)]
pub struct Registry {
    event: Event,
    wallets: HashMap<Address, BTreeMap<Address, U256>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            event: multisig::keyholder_changed(),
            wallets: HashMap::new(),
        }
    }
}

impl Registry {
    /// Applies a keyholder change log. A zero weight removes the keyholder.
    ///
    /// Logs for other events and logs removed by a reorg are ignored, logs
    /// must be applied in chain order.
    pub fn apply(&mut self, log: &Log) -> Result<(), DecodingError> {
        if log.removed || log.topics.first() != Some(&self.event.topic()) {
            return Ok(());
        }

        let (keyholder, weight) = match self.event.decode_log(&log.topics, &log.data)?[..] {
            [Value::Address(keyholder), Value::Uint(weight)] => (keyholder, weight),
            _ => return Err(DecodingError::Invalid("KeyholderChanged".to_owned())),
        };

        let keyholders = self.wallets.entry(log.address).or_default();
        if weight == U256::ZERO {
            keyholders.remove(&keyholder);
        } else {
            keyholders.insert(keyholder, weight);
        }
        tracing::debug!(multisig = %log.address, %keyholder, %weight, "keyholder changed");
        Ok(())
    }

    /// Returns the keyholders of a multisig with their weights.
    pub fn keyholders(&self, multisig: Address) -> BTreeMap<Address, U256> {
        self.wallets.get(&multisig).cloned().unwrap_or_default()
    }

    /// Returns the multisigs in which `owner` holds weight.
    pub fn owned_wallets(&self, owner: Address) -> Vec<Address> {
        let mut wallets = self
            .wallets
            .iter()
            .filter(|(_, keyholders)| keyholders.contains_key(&owner))
            .map(|(multisig, _)| *multisig)
            .collect::<Vec<_>>();
        wallets.sort();
        wallets
    }

    /// Log filter for the keyholder changes of a multisig.
    pub fn multisig_filter(&self, multisig: Address, from_block: u64) -> LogFilter {
        LogFilter {
            from_block: Block::Number(from_block),
            to_block: Block::Latest,
            address: Some(multisig),
            topics: vec![Some(self.event.topic())],
        }
    }

    /// Log filter for the keyholder changes of `owner` across all multisigs.
    pub fn owner_filter(&self, owner: Address, from_block: u64) -> LogFilter {
        let mut topic = H256::default();
        topic.0[12..].copy_from_slice(&owner.0);
        LogFilter {
            from_block: Block::Number(from_block),
            to_block: Block::Latest,
            address: None,
            topics: vec![Some(self.event.topic()), Some(topic)],
        }
    }
}

/// Fetches keyholder change logs matching a filter from a remote node.
pub async fn fetch_logs(remote: &Remote, filter: LogFilter) -> Result<Vec<Log>, RemoteError> {
    let logs = remote.execute(eth::GetLogs, (filter,)).await?;
    tracing::debug!(count = logs.len(), "fetched keyholder logs");
    Ok(logs)
}
