//! Read-only view of the base chain node
//!
//! The scanner only ever reads: tip height, block contents and verbose raw
//! transactions. Nothing in here creates wallets or moves funds.

pub mod connector;
pub mod error;
pub mod transaction;

use self::{error::RpcRequestError, transaction::RawTransaction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `getblockchaininfo`, only the fields the scanner reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u32,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: String,
}

/// `getblock` at verbosity 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub hash: String,
    pub height: u32,
    #[serde(default)]
    pub tx: Vec<String>,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Chain name and tip
    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcRequestError>;

    /// Hash of the block at `height` on the best chain
    async fn get_block_hash(&self, height: u32) -> Result<String, RpcRequestError>;

    /// Block with its transaction ids
    async fn get_block(&self, block_hash: &str) -> Result<BlockSummary, RpcRequestError>;

    /// Decoded transaction with its output scripts. Passing the containing
    /// block's hash lets nodes without a transaction index find it.
    async fn get_raw_transaction(
        &self,
        txid: &str,
        block_hash: Option<&str>,
    ) -> Result<RawTransaction, RpcRequestError>;
}

#[async_trait]
impl<T: ChainRpc + ?Sized> ChainRpc for Arc<T> {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcRequestError> {
        (**self).get_blockchain_info().await
    }

    async fn get_block_hash(&self, height: u32) -> Result<String, RpcRequestError> {
        (**self).get_block_hash(height).await
    }

    async fn get_block(&self, block_hash: &str) -> Result<BlockSummary, RpcRequestError> {
        (**self).get_block(block_hash).await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        block_hash: Option<&str>,
    ) -> Result<RawTransaction, RpcRequestError> {
        (**self).get_raw_transaction(txid, block_hash).await
    }
}
