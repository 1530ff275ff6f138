//! Module for JSON RPC types and the HTTP client for talking to Ethereum nodes.

use reqwest::Url;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// JSON RPC client.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    /// Creates a new client for the given URL.
    pub fn new(url: Url) -> Self {
        Self {
            inner: reqwest::Client::new(),
            url,
        }
    }

    /// Returns the URL of the node the client is connected to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Executes a JSON RPC request.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        tracing::trace!(?request, "executing JSON RPC request");
        let response = self
            .inner
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;
        tracing::trace!(?response, "received JSON RPC response");
        Ok(response)
    }
}

/// JSON RPC client error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An error occured while performing an HTTP request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An error occured serializing or deserializing JSON RPC data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON RPC version.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum JsonRpc {
    #[serde(rename = "2.0")]
    V2,
}

/// JSON RPC message identifier.
///
/// From the JSON-RPC 2.0 specification:
/// > An identifier established by the Client that MUST contain a String,
/// > Number, or NULL value if included. If it is not included it is assumed to
/// > be a notification.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(Number),
    Null,
}

/// JSON RPC params. Ethereum nodes only accept parameters by-position.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Params {
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

/// JSON RPC request.
#[derive(Debug, Deserialize, Serialize)]
pub struct Request {
    pub jsonrpc: JsonRpc,
    pub method: String,
    pub params: Option<Params>,
    pub id: Id,
}

/// JSON RPC response.
#[derive(Debug)]
pub struct Response {
    pub jsonrpc: JsonRpc,
    pub result: Result<Value, Error>,
    pub id: Id,
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Res {
            jsonrpc: JsonRpc,
            // A `null` result is a valid successful response, so it is kept
            // distinct from a missing one.
            #[serde(default, deserialize_with = "present")]
            result: Option<Value>,
            error: Option<Error>,
            id: Id,
        }

        fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Value::deserialize(deserializer).map(Some)
        }

        let res = Res::deserialize(deserializer)?;
        let result = match (res.result, res.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error),
            (Some(_), Some(_)) => return Err(de::Error::custom("both result and error specified")),
            (None, None) => return Err(de::Error::custom("missing result or error")),
        };
        Ok(Response {
            jsonrpc: res.jsonrpc,
            result,
            id: res.id,
        })
    }
}

/// JSON RPC error.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for Error {}
