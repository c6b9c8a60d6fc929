//! JSON-RPC client for bitcoind-style nodes

use super::{
    error::{RpcError, RpcRequestError, TransportError},
    transaction::RawTransaction,
    BlockSummary, ChainInfo, ChainRpc,
};
use crate::constants::{RPC_MAX_ATTEMPTS, RPC_RETRY_DELAY_MILLIS};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{
    any::type_name,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{trace, warn};

const COOKIE_USER: &str = "__cookie__";
const WORK_QUEUE_EXCEEDED: &str = "Work queue depth exceeded";

#[derive(Serialize, Debug)]
struct RpcRequest<'a, T> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: i32,
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Clone)]
enum AuthMethod {
    Basic { username: String, password: String },
    Cookie { cookie: String },
}

/// Node JSON-RPC connection
///
/// Constructed once and handed to whatever needs the node. Each call issues
/// one request and resolves it before returning.
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    url: Url,
    id_counter: Arc<AtomicI32>,
    client: Client,
    auth_method: AuthMethod,
}

impl JsonRpcConnector {
    /// Creates a new connector with basic authentication
    pub fn new_with_basic_auth(
        url: Url,
        username: String,
        password: String,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            url,
            id_counter: Arc::new(AtomicI32::new(0)),
            client: build_client()?,
            auth_method: AuthMethod::Basic { username, password },
        })
    }

    /// Creates a new connector authenticating with the node's cookie file
    pub fn new_with_cookie_auth(url: Url, cookie_path: &Path) -> Result<Self, TransportError> {
        let cookie = read_and_parse_cookie_token(cookie_path)?;
        Ok(Self {
            url,
            id_counter: Arc::new(AtomicI32::new(0)),
            client: build_client()?,
            auth_method: AuthMethod::Cookie { cookie },
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a request and waits for its response.
    ///
    /// Resent up to [RPC_MAX_ATTEMPTS] times while the node reports a full
    /// work queue.
    async fn send_request<T: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: T,
    ) -> Result<R, RpcRequestError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let mut attempts = 0;

        loop {
            attempts += 1;
            trace!("Sending {method} request {id} (attempt {attempts})");

            let response = self
                .build_request(method, &params, id)
                .map_err(RpcRequestError::JsonRpc)?
                .send()
                .await
                .map_err(TransportError::from)?;
            let status = response.status();
            let body = response.bytes().await.map_err(TransportError::from)?;

            if status == StatusCode::SERVICE_UNAVAILABLE
                && String::from_utf8_lossy(&body).contains(WORK_QUEUE_EXCEEDED)
            {
                if attempts >= RPC_MAX_ATTEMPTS {
                    return Err(TransportError::WorkQueueFull.into());
                }
                warn!("Node work queue full, retrying {method} request {id}");
                tokio::time::sleep(Duration::from_millis(RPC_RETRY_DELAY_MILLIS)).await;
                continue;
            }

            // method errors arrive as a JSON body with a non-2xx status
            return match serde_json::from_slice::<RpcResponse<R>>(&body) {
                Ok(RpcResponse {
                    error: Some(error), ..
                }) => Err(RpcRequestError::Method(error)),
                Ok(RpcResponse {
                    result: Some(result),
                    ..
                }) if status.is_success() => Ok(result),
                Ok(_) if status.is_success() => Err(TransportError::EmptyResponseBody.into()),
                Err(e) if status.is_success() => {
                    Err(TransportError::BadNodeData(e, type_name::<R>()).into())
                }
                _ => Err(TransportError::ErrorStatusCode(status.as_u16()).into()),
            };
        }
    }

    fn build_request<T: Serialize>(
        &self,
        method: &str,
        params: T,
        id: i32,
    ) -> serde_json::Result<reqwest::RequestBuilder> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let request_builder = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&request)?);

        Ok(match &self.auth_method {
            AuthMethod::Basic { username, password } => {
                request_builder.basic_auth(username, Some(password))
            }
            AuthMethod::Cookie { cookie } => request_builder.basic_auth(COOKIE_USER, Some(cookie)),
        })
    }
}

#[async_trait]
impl ChainRpc for JsonRpcConnector {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcRequestError> {
        self.send_request("getblockchaininfo", json!([])).await
    }

    async fn get_block_hash(&self, height: u32) -> Result<String, RpcRequestError> {
        self.send_request("getblockhash", json!([height])).await
    }

    async fn get_block(&self, block_hash: &str) -> Result<BlockSummary, RpcRequestError> {
        self.send_request("getblock", json!([block_hash, 1])).await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        block_hash: Option<&str>,
    ) -> Result<RawTransaction, RpcRequestError> {
        let params = match block_hash {
            Some(block_hash) => json!([txid, true, block_hash]),
            None => json!([txid, true]),
        };
        self.send_request("getrawtransaction", params).await
    }
}

fn build_client() -> Result<Client, TransportError> {
    Ok(ClientBuilder::new()
        .connect_timeout(Duration::from_secs(2))
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// The cookie file reads `__cookie__:<token>`, only the token is kept
fn read_and_parse_cookie_token(cookie_path: &Path) -> Result<String, TransportError> {
    let cookie_content = fs::read_to_string(cookie_path).map_err(TransportError::CookieRead)?;
    let trimmed_content = cookie_content.trim();
    Ok(trimmed_content
        .strip_prefix(&format!("{COOKIE_USER}:"))
        .unwrap_or(trimmed_content)
        .to_string())
}
