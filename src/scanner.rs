//! Sequential block scanner
//!
//! One block at a time, in height order: fetch, decode, apply, then advance.
//! Shutdown is only honored between blocks so a height is never advanced to
//! unless all of its payloads were applied.

use crate::{
    block::{store::PayloadStore, BlockPayload},
    codec::payload,
    height::{store::HeightStore, HeightError, HeightTracker},
    rpc::{error::RpcRequestError, ChainRpc},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Rpc(#[from] RpcRequestError),

    #[error(transparent)]
    Height(#[from] HeightError),

    #[error("unable to apply payloads: {0}")]
    Store(#[from] anyhow::Error),
}

pub struct Scanner<R, S> {
    rpc: R,
    store: Arc<S>,
    tracker: HeightTracker<S>,
}

impl<R, S> Scanner<R, S>
where
    R: ChainRpc,
    S: HeightStore + PayloadStore,
{
    pub fn new(rpc: R, store: Arc<S>, start_height: u32) -> Self {
        let tracker = HeightTracker::new(store.clone(), start_height);
        Self {
            rpc,
            store,
            tracker,
        }
    }

    pub fn tracker(&self) -> &HeightTracker<S> {
        &self.tracker
    }

    /// Decode every payload carried in the block at `height`.
    ///
    /// Outputs that do not decode are not payloads and are skipped.
    #[instrument(skip(self))]
    pub async fn scan_block(&self, height: u32) -> Result<Vec<BlockPayload>, ScanError> {
        let block_hash = self.rpc.get_block_hash(height).await?;
        let block = self.rpc.get_block(&block_hash).await?;
        let mut payloads = vec![];

        for txid in &block.tx {
            let tx = self
                .rpc
                .get_raw_transaction(txid, Some(&block_hash))
                .await?;

            for (vout, blob) in tx.data_carriers() {
                match payload::decode(&blob) {
                    Ok(payload) => payloads.push(BlockPayload {
                        height,
                        txid: tx.txid.clone(),
                        vout,
                        payload,
                    }),
                    Err(e) => trace!("Skipping {}:{vout}, not a payload: {e}", tx.txid),
                }
            }
        }

        debug!(
            "Found {} payloads in {} transactions at height {height}",
            payloads.len(),
            block.tx.len()
        );
        Ok(payloads)
    }

    /// Apply every block from the resume height up to the current tip.
    ///
    /// Each block is claimed by moving the height from the one before it, so
    /// if another scanner on the same store gets there first this fails with
    /// [HeightError::Conflict] instead of applying the block twice.
    ///
    /// Returns the number of blocks processed.
    pub async fn sync(&self, shutdown: &watch::Receiver<bool>) -> Result<u32, ScanError> {
        let tip = self.rpc.get_blockchain_info().await?.blocks;
        let mut current = self.tracker.get()?;
        let mut processed = 0;

        while let Some(height) = current.checked_add(1).filter(|height| *height <= tip) {
            if *shutdown.borrow() {
                info!("Shutdown requested, stopping before height {height}");
                break;
            }

            let payloads = self.scan_block(height).await?;
            self.store.add_block_payloads(height, &payloads)?;
            self.tracker.compare_and_advance(current, height)?;
            current = height;
            processed += 1;
        }
        Ok(processed)
    }

    /// Keep syncing, waiting `poll_interval` between passes, until shutdown
    pub async fn run(
        &self,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ScanError> {
        info!(
            "Scanning from height {} every {poll_interval:?}",
            self.tracker.next_height()?
        );

        loop {
            let processed = self.sync(&shutdown).await?;
            if processed > 0 {
                info!(
                    "Processed {processed} blocks, max processed height {}",
                    self.tracker.get()?
                );
            }

            if *shutdown.borrow() {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                changed = shutdown.changed() => {
                    // sender gone, nothing can ask us to stop anymore
                    if changed.is_err() {
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        }
    }
}
