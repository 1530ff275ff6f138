//! Typed access to a remote Ethereum node.

pub mod method;
pub mod remote;
pub mod types;

pub use self::remote::{Remote, RemoteError};
