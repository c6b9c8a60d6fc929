//! Error types for the node's JSON-RPC interface

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error object returned by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC Error (code: {}): {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("unable to read cookie file: {0}")]
    CookieRead(#[source] std::io::Error),

    #[error("node responded with status code {0}")]
    ErrorStatusCode(u16),

    #[error("node data could not be parsed as {1}: {0}")]
    BadNodeData(#[source] serde_json::Error, &'static str),

    #[error("node returned neither a result nor an error")]
    EmptyResponseBody,

    #[error("node work queue is full")]
    WorkQueueFull,
}

#[derive(Debug, Error)]
pub enum RpcRequestError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Method error: {0}")]
    Method(RpcError),

    #[error("request input failed to serialize: {0}")]
    JsonRpc(#[source] serde_json::Error),
}
