//! A module implementing JSON RPC client for a remote Ethereum node.

use super::method::Method;
use crate::jsonrpc::{self, Client, ClientError, Id, JsonRpc, Params, Request};
use reqwest::Url;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A remote Ethereum node.
pub struct Remote {
    client: Client,
    ids: AtomicU64,
}

impl Remote {
    /// Create a new remote Ethereum node client.
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(url),
            ids: Default::default(),
        }
    }

    /// Returns the URL of the remote node.
    pub fn url(&self) -> &Url {
        self.client.url()
    }

    /// Executes a typed method call.
    pub async fn execute<M>(&self, method: M, params: M::Params) -> Result<M::Result, RemoteError>
    where
        M: Method,
        M::Params: Serialize,
        M::Result: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Array(array) => Params::Array(array),
            // Methods without parameters serialize their empty tuple as `null`.
            Value::Null => Params::Array(Vec::new()),
            value => Params::Array(vec![value]),
        };

        let id = self.ids.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            jsonrpc: JsonRpc::V2,
            method: method.into_name(),
            params: Some(params),
            id: Id::Number(id.into()),
        };

        let response = self.client.execute(request).await?;
        let result = serde_json::from_value(response.result?)?;

        Ok(result)
    }
}

/// An error executing a JSON RPC request with a remote node.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An error occured during JSON serialization of method parameters or
    /// result.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error occured in the underlying JSON RPC client.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// A JSON RPC error occured while processing the request, this includes
    /// reverted contract calls.
    #[error("Ethereum RPC error: {0}")]
    Rpc(#[from] jsonrpc::Error),
}
