//! Signing requests: proposed multisig calls and their accumulated signatures.

use crate::{
    abi::{EncodingError, Fragment, Function, Value},
    address::Address,
    chain::{ChainError, ChainView},
    crypto::{keccak256, InvalidSignatureEncoding, Signature, H256},
    serialization::{Bytes, Quantity},
    status::{self, SigningRequestStatus},
};
use ethnum::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// A proposed call from the multisig along with the keyholder signatures
/// collected for it so far.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningRequest {
    /// Identifier of a persisted request, equal to its canonical hash.
    pub id: Option<H256>,
    pub destination: Address,
    pub value: U256,
    pub data: Vec<u8>,
    /// Interface describing `data`, when known.
    pub abi: Option<Function>,
    pub nonce: u64,
    /// Detached signatures in the order they were added. These are not
    /// validated, malformed entries are reported when computing the status.
    pub signatures: Vec<Vec<u8>>,
    pub description: Option<String>,
}

/// Arguments for constructing a signing request.
///
/// Call data is either given raw in `data`, or as JSON `inputs` to be encoded
/// with `abi`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestArgs {
    #[serde(default)]
    pub id: Option<H256>,
    pub destination: Address,
    #[serde(default)]
    pub value: Quantity,
    #[serde(default)]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub inputs: Option<Vec<Json>>,
    #[serde(default)]
    pub abi: Option<Function>,
    pub nonce: u64,
    #[serde(default)]
    pub signatures: Vec<Bytes>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SigningRequest {
    /// Creates a new signing request.
    pub fn new(args: RequestArgs) -> Result<Self, RequestError> {
        let data = match (args.data, args.inputs, &args.abi) {
            (Some(_), Some(_), _) => return Err(MalformedRequest::DataAndInputs.into()),
            (_, Some(_), None) => return Err(MalformedRequest::InputsWithoutAbi.into()),
            (Some(data), None, _) => data.0,
            (None, Some(inputs), Some(abi)) => abi.encode_call(&abi.args_from_json(&inputs)?)?,
            (None, None, _) => Vec::new(),
        };

        Ok(Self {
            id: args.id,
            destination: args.destination,
            value: args.value.0,
            data,
            abi: args.abi,
            nonce: args.nonce,
            signatures: args.signatures.into_iter().map(|s| s.0).collect(),
            description: args.description,
        })
    }

    /// Decodes the call arguments from `data` using the request's ABI.
    ///
    /// Returns `None` if there is no ABI or it does not describe `data`.
    pub fn inputs(&self) -> Option<Vec<Value>> {
        self.abi.as_ref()?.decode_call(&self.data)
    }

    /// Describes what the request does, from the most to the least specific
    /// description available.
    pub fn describe(&self) -> Description {
        let (destination, value) = (self.destination, self.value);
        match (&self.abi, self.inputs()) {
            (Some(abi), Some(_)) => Description::Call {
                function: abi.name.clone(),
                destination,
                value,
            },
            _ if !self.data.is_empty() => Description::UnknownCall { destination, value },
            _ if value != U256::ZERO => Description::Send { destination, value },
            _ => Description::Ping { destination },
        }
    }

    /// Returns an identifier for the request that does not require the chain.
    ///
    /// This is the persisted identifier when there is one. It is only used to
    /// tell requests apart locally and is never signed.
    pub fn key(&self) -> H256 {
        if let Some(id) = self.id {
            return id;
        }
        let mut buffer = Vec::with_capacity(20 + 32 + 8 + self.data.len());
        buffer.extend_from_slice(&self.destination.0);
        buffer.extend_from_slice(&self.value.to_be_bytes());
        buffer.extend_from_slice(&self.nonce.to_be_bytes());
        buffer.extend_from_slice(&self.data);
        keccak256(buffer)
    }

    /// Computes the canonical hash keyholders sign for this request, as
    /// computed by the multisig contract itself.
    pub async fn hash<C>(&self, chain: &C) -> Result<H256, ChainError>
    where
        C: ChainView + ?Sized,
    {
        chain
            .transaction_hash(
                self.destination,
                self.value,
                &self.data,
                U256::from(self.nonce),
            )
            .await
    }

    /// Computes the current signing status of the request from on-chain
    /// keyholder weights and threshold.
    pub async fn status<C>(&self, chain: &C) -> Result<SigningRequestStatus, ChainError>
    where
        C: ChainView + ?Sized,
    {
        let hash = self.hash(chain).await?;
        status::aggregate(hash, &self.signatures, chain).await
    }

    /// Adds a signature over `hash`, replacing any existing signature by the
    /// same signer. Returns the signer's address.
    pub fn merge_signature(
        &mut self,
        hash: H256,
        signature: Signature,
    ) -> Result<Address, InvalidSignatureEncoding> {
        let signer = signature.recover(hash)?;
        let existing = self.signatures.iter().position(|bytes| {
            Signature::from_slice(bytes)
                .and_then(|existing| existing.recover(hash))
                .map_or(false, |address| address == signer)
        });

        match existing {
            Some(index) => self.signatures[index] = signature.to_vec(),
            None => self.signatures.push(signature.to_vec()),
        }
        Ok(signer)
    }
}

/// A human readable description of a signing request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Description {
    /// A call to a known function.
    Call {
        function: String,
        destination: Address,
        value: U256,
    },
    /// A call with data for a function with no known interface.
    UnknownCall { destination: Address, value: U256 },
    /// A plain ether transfer.
    Send { destination: Address, value: U256 },
    /// A call without data or value.
    Ping { destination: Address },
}

impl Display for Description {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let amount = |f: &mut Formatter, value: U256| {
            if value == U256::ZERO {
                Ok(())
            } else {
                write!(f, " with {} ether", format_ether(value))
            }
        };

        match self {
            Self::Call {
                function,
                destination,
                value,
            } => {
                write!(f, "Call {function} on {destination}")?;
                amount(f, *value)
            }
            Self::UnknownCall { destination, value } => {
                write!(f, "Call an unknown function on {destination}")?;
                amount(f, *value)
            }
            Self::Send { destination, value } => {
                write!(f, "Send {} ether to {destination}", format_ether(*value))
            }
            Self::Ping { destination } => write!(f, "Call {destination}"),
        }
    }
}

/// Formats an amount of wei as decimal ether, without trailing zeros.
pub fn format_ether(wei: U256) -> String {
    let unit = U256::new(1_000_000_000_000_000_000);
    let (whole, fraction) = (wei / unit, wei % unit);
    if fraction == U256::ZERO {
        return whole.to_string();
    }

    let digits = fraction.to_string();
    let fraction = format!("{}{digits}", "0".repeat(18 - digits.len()));
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// A signing request as exchanged with the persistence backend.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequestRecord {
    pub id: H256,
    pub destination: Address,
    pub value: Quantity,
    pub data: Bytes,
    /// JSON of the function fragment describing `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,
    pub nonce: u64,
    pub signatures: Vec<Bytes>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SigningRequestRecord {
    /// Creates a record for a request identified by its canonical hash.
    pub fn new(id: H256, request: &SigningRequest) -> Result<Self, RequestError> {
        let abi = request
            .abi
            .as_ref()
            .map(|abi| serde_json::to_string(&Fragment::Function(abi.clone())))
            .transpose()?;

        Ok(Self {
            id,
            destination: request.destination,
            value: Quantity(request.value),
            data: Bytes(request.data.clone()),
            abi,
            nonce: request.nonce,
            signatures: request.signatures.iter().cloned().map(Bytes).collect(),
            description: request.description.clone(),
        })
    }
}

impl TryFrom<SigningRequestRecord> for SigningRequest {
    type Error = RequestError;

    fn try_from(record: SigningRequestRecord) -> Result<Self, Self::Error> {
        let abi = match record.abi.as_deref().map(str::parse::<Fragment>).transpose()? {
            Some(Fragment::Function(function)) => Some(function),
            Some(Fragment::Event(_)) => return Err(MalformedRequest::EventAbi.into()),
            None => None,
        };

        Ok(Self {
            id: Some(record.id),
            destination: record.destination,
            value: record.value.0,
            data: record.data.0,
            abi,
            nonce: record.nonce,
            signatures: record.signatures.into_iter().map(|s| s.0).collect(),
            description: record.description,
        })
    }
}

/// Invalid combination of signing request fields.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum MalformedRequest {
    #[error("cannot specify both data and inputs")]
    DataAndInputs,
    #[error("cannot specify inputs without abi")]
    InputsWithoutAbi,
    #[error("abi must describe a function")]
    EventAbi,
}

/// An error constructing a signing request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Malformed(#[from] MalformedRequest),
    #[error("invalid call inputs: {0}")]
    Encoding(#[from] EncodingError),
    #[error("invalid abi: {0}")]
    Abi(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abi::{Param, ParamType},
        testing::{FakeChain, Keyholder},
    };
    use serde_json::json;

    const DESTINATION: Address = Address([0xaa; 20]);
    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    fn transfer() -> Function {
        Function::new(
            "transfer",
            vec![
                Param::new("to", ParamType::Address),
                Param::new("amount", ParamType::Uint(256)),
            ],
            vec![Param::new("", ParamType::Bool)],
        )
    }

    fn request(value: u128, data: Vec<u8>) -> SigningRequest {
        SigningRequest::new(RequestArgs {
            destination: DESTINATION,
            value: Quantity(U256::new(value)),
            data: Some(Bytes(data)),
            nonce: 7,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn data_and_inputs_are_exclusive() {
        let err = SigningRequest::new(RequestArgs {
            data: Some(Bytes(vec![1, 2, 3, 4])),
            inputs: Some(vec![]),
            abi: Some(transfer()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Malformed(MalformedRequest::DataAndInputs)
        ));
    }

    #[test]
    fn inputs_require_abi() {
        let err = SigningRequest::new(RequestArgs {
            inputs: Some(vec![json!("0x4242424242424242424242424242424242424242"), json!(1)]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Malformed(MalformedRequest::InputsWithoutAbi)
        ));
    }

    #[test]
    fn encodes_inputs() {
        let request = SigningRequest::new(RequestArgs {
            destination: DESTINATION,
            inputs: Some(vec![
                json!("0x4242424242424242424242424242424242424242"),
                json!("1000"),
            ]),
            abi: Some(transfer()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(&request.data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(request.data.len(), 4 + 64);
        assert_eq!(
            request.inputs(),
            Some(vec![
                Value::Address(Address([0x42; 20])),
                Value::Uint(U256::new(1000)),
            ]),
        );
    }

    #[test]
    fn mistyped_inputs() {
        let err = SigningRequest::new(RequestArgs {
            inputs: Some(vec![json!(true), json!(1)]),
            abi: Some(transfer()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, RequestError::Encoding(_)));
    }

    #[test]
    fn inputs_need_matching_selector() {
        let mut request = request(0, vec![0xde, 0xad, 0xbe, 0xef, 0, 0]);
        assert_eq!(request.inputs(), None);

        request.abi = Some(transfer());
        assert_eq!(request.inputs(), None);
    }

    #[test]
    fn descriptions() {
        assert_eq!(
            request(0, vec![]).describe().to_string(),
            "Call 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa",
        );
        assert_eq!(
            request(ONE_ETHER, vec![]).describe().to_string(),
            "Send 1 ether to 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa",
        );
        assert_eq!(
            request(0, vec![0xde, 0xad, 0xbe, 0xef]).describe().to_string(),
            "Call an unknown function on 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa",
        );

        let data = transfer()
            .encode_call(&[Value::Address(Address([0x42; 20])), Value::Uint(U256::ONE)])
            .unwrap();
        let mut known = request(ONE_ETHER / 2, data);
        assert_eq!(
            known.describe().to_string(),
            "Call an unknown function on 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa with 0.5 ether",
        );
        known.abi = Some(transfer());
        assert_eq!(
            known.describe().to_string(),
            "Call transfer on 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa with 0.5 ether",
        );
    }

    #[test]
    fn ether_amounts() {
        assert_eq!(format_ether(U256::ZERO), "0");
        assert_eq!(format_ether(U256::new(ONE_ETHER)), "1");
        assert_eq!(format_ether(U256::new(1_500_000_000_000_000_000)), "1.5");
        assert_eq!(format_ether(U256::ONE), "0.000000000000000001");
        assert_eq!(format_ether(U256::new(1234 * ONE_ETHER)), "1234");
    }

    #[test]
    fn merges_signatures_by_signer() {
        let hash = H256([0x11; 32]);
        let (alice, bob) = (Keyholder::new(1), Keyholder::new(2));
        let mut request = request(0, vec![]);
        request.signatures.push(vec![0; 3]);

        assert_eq!(request.merge_signature(hash, alice.sign(hash)), Ok(alice.address));
        assert_eq!(request.merge_signature(hash, bob.sign(hash)), Ok(bob.address));
        assert_eq!(request.signatures.len(), 3);

        // Same signer with a different encoding of the recovery byte.
        let mut again = alice.sign(hash);
        again.0[64] -= 27;
        assert_eq!(request.merge_signature(hash, again), Ok(alice.address));
        assert_eq!(request.signatures.len(), 3);
        assert_eq!(request.signatures[1], again.to_vec());
    }

    #[tokio::test]
    async fn hash_comes_from_chain() {
        let chain = FakeChain::new(Address([0x5e; 20]));
        let request = request(ONE_ETHER, vec![1, 2, 3]);

        let hash = request.hash(&chain).await.unwrap();
        assert_eq!(hash, request.hash(&chain).await.unwrap());
        assert_eq!(
            hash,
            chain.local_hash(DESTINATION, U256::new(ONE_ETHER), &[1, 2, 3], U256::new(7)),
        );
    }

    #[test]
    fn records() {
        let mut request = request(ONE_ETHER, vec![]);
        request.abi = Some(transfer());
        request.description = Some("rent".to_owned());
        request.signatures.push(vec![0x01, 0x02]);

        let id = H256([0x11; 32]);
        let record = SigningRequestRecord::new(id, &request).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], json!(id.to_string()));
        assert_eq!(json["value"], json!("0xde0b6b3a7640000"));
        assert_eq!(json["data"], json!("0x"));
        assert_eq!(json["signatures"], json!(["0x0102"]));

        let restored = SigningRequest::try_from(record).unwrap();
        assert_eq!(restored.id, Some(id));
        assert_eq!(restored.abi, request.abi);
        assert_eq!(restored.signatures, request.signatures);
        assert_eq!(restored.key(), id);
    }

    #[test]
    fn record_with_event_abi() {
        let record = SigningRequestRecord {
            id: H256::default(),
            destination: DESTINATION,
            value: Quantity::default(),
            data: Bytes::default(),
            abi: Some(r#"{"type":"event","name":"Ping","inputs":[]}"#.to_owned()),
            nonce: 0,
            signatures: Vec::new(),
            description: None,
        };
        assert!(matches!(
            SigningRequest::try_from(record),
            Err(RequestError::Malformed(MalformedRequest::EventAbi)),
        ));
    }
}
