//! The MetaMultisig contract interface.
//!
//! Administrative changes to the multisig (keyholder weights and the signing
//! threshold) are calls from the multisig to itself, and go through the same
//! signing request flow as any other call.

use crate::{
    abi::{EncodingError, Event, Function, Param, ParamType, Value},
    address::Address,
    request::SigningRequest,
};
use ethnum::U256;

/// The first block scanned for keyholder changes by default.
pub const DEPLOYMENT_BLOCK: u64 = 5_473_234;

/// `keyholders(address) returns (uint256)`
pub fn keyholders() -> Function {
    Function::new(
        "keyholders",
        vec![Param::new("", ParamType::Address)],
        vec![Param::new("", ParamType::Uint(256))],
    )
}

/// `threshold() returns (uint256)`
pub fn threshold() -> Function {
    Function::new(
        "threshold",
        Vec::new(),
        vec![Param::new("", ParamType::Uint(256))],
    )
}

/// `getTransactionHash(address,uint256,bytes,uint256) returns (bytes32)`
pub fn get_transaction_hash() -> Function {
    Function::new(
        "getTransactionHash",
        call_params(),
        vec![Param::new("", ParamType::FixedBytes(32))],
    )
}

/// `submit(address,uint256,bytes,uint256,bytes[])`
pub fn submit() -> Function {
    let mut inputs = call_params();
    inputs.push(Param::new(
        "signatures",
        ParamType::Array(Box::new(ParamType::Bytes)),
    ));
    Function::new("submit", inputs, Vec::new())
}

/// `setKeyholderWeight(address,uint256)`
pub fn set_keyholder_weight() -> Function {
    Function::new(
        "setKeyholderWeight",
        vec![
            Param::new("keyholder", ParamType::Address),
            Param::new("weight", ParamType::Uint(256)),
        ],
        Vec::new(),
    )
}

/// `setThreshold(uint256)`
pub fn set_threshold() -> Function {
    Function::new(
        "setThreshold",
        vec![Param::new("threshold", ParamType::Uint(256))],
        Vec::new(),
    )
}

/// `event KeyholderChanged(address indexed keyholder, uint256 weight)`
pub fn keyholder_changed() -> Event {
    Event::new(
        "KeyholderChanged",
        vec![
            Param::indexed("keyholder", ParamType::Address),
            Param::new("weight", ParamType::Uint(256)),
        ],
    )
}

fn call_params() -> Vec<Param> {
    vec![
        Param::new("destination", ParamType::Address),
        Param::new("value", ParamType::Uint(256)),
        Param::new("data", ParamType::Bytes),
        Param::new("nonce", ParamType::Uint(256)),
    ]
}

/// Proposes adding, updating or, with a zero weight, removing a keyholder.
pub fn propose_keyholder_weight(
    multisig: Address,
    nonce: u64,
    keyholder: Address,
    weight: U256,
) -> Result<SigningRequest, EncodingError> {
    let description = if weight == U256::ZERO {
        format!("Remove keyholder {keyholder}")
    } else {
        format!("Set weight of keyholder {keyholder} to {weight}")
    };
    propose(
        multisig,
        nonce,
        set_keyholder_weight(),
        &[Value::Address(keyholder), Value::Uint(weight)],
        description,
    )
}

/// Proposes changing the signing threshold.
pub fn propose_threshold(
    multisig: Address,
    nonce: u64,
    threshold: U256,
) -> Result<SigningRequest, EncodingError> {
    propose(
        multisig,
        nonce,
        set_threshold(),
        &[Value::Uint(threshold)],
        format!("Set signing threshold to {threshold}"),
    )
}

fn propose(
    multisig: Address,
    nonce: u64,
    function: Function,
    args: &[Value],
    description: String,
) -> Result<SigningRequest, EncodingError> {
    Ok(SigningRequest {
        id: None,
        destination: multisig,
        value: U256::ZERO,
        data: function.encode_call(args)?,
        abi: Some(function),
        nonce,
        signatures: Vec::new(),
        description: Some(description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(keyholders().signature(), "keyholders(address)");
        assert_eq!(
            get_transaction_hash().signature(),
            "getTransactionHash(address,uint256,bytes,uint256)",
        );
        assert_eq!(
            submit().signature(),
            "submit(address,uint256,bytes,uint256,bytes[])",
        );
        assert_eq!(
            keyholder_changed().signature(),
            "KeyholderChanged(address,uint256)",
        );
        for function in [
            keyholders(),
            threshold(),
            get_transaction_hash(),
            submit(),
            set_keyholder_weight(),
            set_threshold(),
        ] {
            assert_eq!(
                Function::from_signature(&function.signature())
                    .unwrap()
                    .selector(),
                function.selector(),
            );
        }
    }

    #[test]
    fn keyholder_proposal() {
        let multisig = Address([0xaa; 20]);
        let request =
            propose_keyholder_weight(multisig, 3, Address([0x42; 20]), U256::new(2)).unwrap();

        assert_eq!(request.destination, multisig);
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.nonce, 3);
        assert_eq!(
            request.inputs(),
            Some(vec![
                Value::Address(Address([0x42; 20])),
                Value::Uint(U256::new(2)),
            ]),
        );
        assert_eq!(
            request.describe().to_string(),
            "Call setKeyholderWeight on 0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa",
        );
    }

    #[test]
    fn threshold_proposal() {
        let request = propose_threshold(Address([0xaa; 20]), 4, U256::new(5)).unwrap();
        assert_eq!(&request.data[..4], &set_threshold().selector());
        assert_eq!(
            request.description.as_deref(),
            Some("Set signing threshold to 5"),
        );
    }
}
