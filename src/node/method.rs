//! Method trait and type definitions for attaching associated types to RPC
//! methods.

/// An Ethereum JSON RPC method.
pub trait Method {
    type Params;
    type Result;

    fn into_name(self) -> String;
}

macro_rules! impl_method {
    ($(
        $(#[$attr:meta])*
        pub struct $m:ident = $s:literal ($($p:ty),*) -> $r:ty;
    )*) => {$(
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $m;

        impl $crate::node::method::Method for $m {
            type Params = ($($p,)*);
            type Result = $r;

            fn into_name(self) -> String {
                $s.to_owned()
            }
        }

        impl PartialEq<str> for $m {
            fn eq(&self, other: &str) -> bool {
                $s == other
            }
        }
    )*};
}

pub mod eth {
    use crate::{
        address::Address,
        crypto::{Signature, H256},
        node::types::{Block, CallRequest, Log, LogFilter, TransactionRequest},
        serialization::Bytes,
    };

    impl_method! {
        /// Returns the accounts managed by the node.
        pub struct Accounts = "eth_accounts" () -> Vec<Address>;

        /// Executes a read-only message call.
        pub struct Call = "eth_call" (CallRequest, Block) -> Bytes;

        /// Signs a message with the Ethereum personal message prefix.
        pub struct Sign = "eth_sign" (Address, Bytes) -> Signature;

        /// Signs and sends a transaction from an account managed by the node.
        pub struct SendTransaction = "eth_sendTransaction" (TransactionRequest) -> H256;

        /// Returns logs matching a filter.
        pub struct GetLogs = "eth_getLogs" (LogFilter) -> Vec<Log>;
    }
}
