use crate::helpers::setup_new_db_dir;
use async_trait::async_trait;
use overlay_indexer::{
    block::{store::PayloadStore, BlockPayload},
    codec::{payload, Payload},
    constants::GENESIS_HEIGHT,
    height::{store::HeightStore, HeightError},
    rpc::{
        error::{RpcError, RpcRequestError},
        transaction::{RawTransaction, ScriptPubKey, TxOutput, NULL_DATA},
        BlockSummary, ChainInfo, ChainRpc,
    },
    scanner::{ScanError, Scanner},
    store::IndexerStore,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::watch;

/// In-memory chain, block `n` is at index `n`
#[derive(Default)]
struct FakeChain {
    blocks: Mutex<Vec<Vec<RawTransaction>>>,
    fail_at: Mutex<Option<u32>>,
    requested: Mutex<Vec<u32>>,
}

impl FakeChain {
    fn with_empty_blocks(count: usize) -> Self {
        let chain = Self::default();
        chain.blocks.lock().unwrap().resize(count, vec![]);
        chain
    }

    fn push_block(&self, txs: Vec<RawTransaction>) {
        self.blocks.lock().unwrap().push(txs);
    }

    fn set_block(&self, height: u32, txs: Vec<RawTransaction>) {
        self.blocks.lock().unwrap()[height as usize] = txs;
    }

    fn tip(&self) -> u32 {
        self.blocks.lock().unwrap().len() as u32 - 1
    }

    fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    fn transactions(&self) -> HashMap<String, RawTransaction> {
        self.blocks
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|tx| (tx.txid.clone(), tx.clone()))
            .collect()
    }
}

fn not_found(message: &str) -> RpcRequestError {
    RpcRequestError::Method(RpcError {
        code: -5,
        message: message.to_string(),
    })
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, RpcRequestError> {
        Ok(ChainInfo {
            chain: "regtest".into(),
            blocks: self.tip(),
            best_block_hash: format!("hash-{}", self.tip()),
        })
    }

    async fn get_block_hash(&self, height: u32) -> Result<String, RpcRequestError> {
        if *self.fail_at.lock().unwrap() == Some(height) {
            return Err(RpcRequestError::Method(RpcError {
                code: -28,
                message: "Loading block index".into(),
            }));
        }
        if height > self.tip() {
            return Err(not_found("Block height out of range"));
        }

        self.requested.lock().unwrap().push(height);
        Ok(format!("hash-{height}"))
    }

    async fn get_block(&self, block_hash: &str) -> Result<BlockSummary, RpcRequestError> {
        let height: u32 = block_hash
            .strip_prefix("hash-")
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| not_found("Block not found"))?;
        let blocks = self.blocks.lock().unwrap();
        let txs = blocks
            .get(height as usize)
            .ok_or_else(|| not_found("Block not found"))?;

        Ok(BlockSummary {
            hash: block_hash.to_string(),
            height,
            tx: txs.iter().map(|tx| tx.txid.clone()).collect(),
        })
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        _block_hash: Option<&str>,
    ) -> Result<RawTransaction, RpcRequestError> {
        self.transactions()
            .remove(txid)
            .ok_or_else(|| not_found("No such mempool or blockchain transaction"))
    }
}

fn output(n: u32, hex: String, kind: &str) -> TxOutput {
    TxOutput {
        n,
        script_pub_key: ScriptPubKey {
            asm: String::new(),
            hex,
            kind: kind.to_string(),
        },
    }
}

/// Transaction with a spend output then one `OP_RETURN` per blob
fn transaction(txid: &str, blobs: &[&str]) -> RawTransaction {
    let mut vout = vec![output(
        0,
        "76a91489abcdefabbaabbaabbaabbaabbaabbaabbaabba88ac".into(),
        "pubkeyhash",
    )];
    for (n, blob) in blobs.iter().enumerate() {
        let script = format!("6a{:02x}{blob}", blob.len() / 2);
        vout.push(output(n as u32 + 1, script, NULL_DATA));
    }

    RawTransaction {
        txid: txid.to_string(),
        vout,
    }
}

fn scanner(
    chain: Arc<FakeChain>,
    store: Arc<IndexerStore>,
    start_height: u32,
) -> Scanner<Arc<FakeChain>, IndexerStore> {
    Scanner::new(chain, store, start_height)
}

/// Rocksdb store whose height write can be made to fail, or to lose to
/// another writer, at a chosen height
#[derive(Debug)]
struct HookedStore {
    inner: IndexerStore,
    fail_height_write_at: Mutex<Option<u32>>,
    claimed_elsewhere_at: Mutex<Option<u32>>,
}

impl HookedStore {
    fn new(inner: IndexerStore) -> Self {
        Self {
            inner,
            fail_height_write_at: Mutex::new(None),
            claimed_elsewhere_at: Mutex::new(None),
        }
    }

    fn take_if(hook: &Mutex<Option<u32>>, height: u32) -> bool {
        let mut hook = hook.lock().unwrap();
        if *hook == Some(height) {
            *hook = None;
            return true;
        }
        false
    }
}

impl HeightStore for HookedStore {
    fn get_max_processed_height(&self) -> anyhow::Result<Option<u32>> {
        self.inner.get_max_processed_height()
    }

    fn set_max_processed_height(&self, height: u32) -> anyhow::Result<()> {
        self.inner.set_max_processed_height(height)
    }

    fn compare_and_set_max_processed_height(
        &self,
        expected: Option<u32>,
        height: u32,
    ) -> anyhow::Result<bool> {
        if Self::take_if(&self.fail_height_write_at, height) {
            anyhow::bail!("simulated crash before persisting height {height}");
        }
        if Self::take_if(&self.claimed_elsewhere_at, height) {
            assert!(self
                .inner
                .compare_and_set_max_processed_height(expected, height)?);
        }
        self.inner
            .compare_and_set_max_processed_height(expected, height)
    }
}

impl PayloadStore for HookedStore {
    fn add_block_payloads(&self, height: u32, payloads: &[BlockPayload]) -> anyhow::Result<()> {
        self.inner.add_block_payloads(height, payloads)
    }

    fn get_block_payloads(&self, height: u32) -> anyhow::Result<Vec<BlockPayload>> {
        self.inner.get_block_payloads(height)
    }
}

#[tokio::test]
async fn sync_applies_payloads_then_advances() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-sync")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(4));
    let blob = payload::encode(2, 10_000_000);
    chain.set_block(2, vec![transaction("tx-a", &[blob.as_str()])]);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = scanner(chain.clone(), store.clone(), GENESIS_HEIGHT);

    assert_eq!(scanner.sync(&shutdown_rx).await?, 3);
    assert_eq!(chain.requested(), vec![1, 2, 3]);
    assert_eq!(scanner.tracker().get()?, 3);

    let payloads = store.get_block_payloads(2)?;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].txid, "tx-a");
    assert_eq!(payloads[0].vout, 1);
    assert_eq!(payloads[0].payload, Payload::new(2, 10_000_000));

    // caught up
    assert_eq!(scanner.sync(&shutdown_rx).await?, 0);
    Ok(())
}

#[tokio::test]
async fn malformed_outputs_are_skipped() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-malformed")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(1));
    let good = payload::encode(7, 1);
    chain.push_block(vec![
        transaction("tx-short", &["0000000200000000"]),
        transaction("tx-mixed", &["deadbeef", good.as_str(), "00"]),
    ]);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = scanner(chain, store.clone(), GENESIS_HEIGHT);

    assert_eq!(scanner.sync(&shutdown_rx).await?, 1);
    let payloads = store.get_block_payloads(1)?;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].txid, "tx-mixed");
    assert_eq!(payloads[0].vout, 2);
    assert_eq!(payloads[0].payload, Payload::new(7, 1));
    Ok(())
}

#[tokio::test]
async fn resumes_after_restart() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-resume")?;
    let chain = Arc::new(FakeChain::with_empty_blocks(11));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let store = Arc::new(IndexerStore::new(store_dir.path())?);
        let scanner = scanner(chain.clone(), store, 5);
        assert_eq!(scanner.sync(&shutdown_rx).await?, 5);
    }
    assert_eq!(chain.requested(), vec![6, 7, 8, 9, 10]);

    chain.push_block(vec![]);
    chain.push_block(vec![]);

    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let scanner = scanner(chain.clone(), store, 5);
    assert_eq!(scanner.sync(&shutdown_rx).await?, 2);
    assert_eq!(chain.requested(), vec![6, 7, 8, 9, 10, 11, 12]);
    assert_eq!(scanner.tracker().get()?, 12);
    Ok(())
}

#[tokio::test]
async fn rpc_failure_keeps_last_good_height() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-rpc-failure")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(6));
    *chain.fail_at.lock().unwrap() = Some(4);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = scanner(chain.clone(), store, GENESIS_HEIGHT);

    assert!(matches!(
        scanner.sync(&shutdown_rx).await,
        Err(ScanError::Rpc(RpcRequestError::Method(_)))
    ));
    assert_eq!(scanner.tracker().get()?, 3);

    *chain.fail_at.lock().unwrap() = None;
    assert_eq!(scanner.sync(&shutdown_rx).await?, 2);
    assert_eq!(scanner.tracker().get()?, 5);
    Ok(())
}

#[tokio::test]
async fn shutdown_before_sync() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-shutdown")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(3));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true)?;
    let scanner = scanner(chain.clone(), store, GENESIS_HEIGHT);

    assert_eq!(scanner.sync(&shutdown_rx).await?, 0);
    assert!(chain.requested().is_empty());
    assert_eq!(scanner.tracker().get()?, GENESIS_HEIGHT);
    Ok(())
}

#[tokio::test]
async fn run_stops_on_shutdown() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-run")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(3));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = scanner(chain, store, GENESIS_HEIGHT);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true)
    };

    let (result, sent) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(scanner.run(Duration::from_secs(3600), shutdown_rx), stop) },
    )
    .await?;

    result?;
    sent?;
    assert_eq!(scanner.tracker().get()?, 2);
    Ok(())
}

#[tokio::test]
async fn height_write_failure_rescans_the_block() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-height-write-failure")?;
    let store = Arc::new(HookedStore::new(IndexerStore::new(store_dir.path())?));
    let chain = Arc::new(FakeChain::with_empty_blocks(4));
    let blob = payload::encode(2, 500);
    chain.set_block(2, vec![transaction("tx-a", &[blob.as_str()])]);
    *store.fail_height_write_at.lock().unwrap() = Some(2);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = Scanner::new(chain.clone(), store.clone(), GENESIS_HEIGHT);

    // payloads of block 2 are applied but its height is not
    assert!(matches!(
        scanner.sync(&shutdown_rx).await,
        Err(ScanError::Height(HeightError::Store(_)))
    ));
    assert_eq!(scanner.tracker().get()?, 1);
    assert_eq!(store.get_block_payloads(2)?.len(), 1);

    assert_eq!(scanner.sync(&shutdown_rx).await?, 2);
    assert_eq!(chain.requested(), vec![1, 2, 2, 3]);
    assert_eq!(scanner.tracker().get()?, 3);

    let payloads = store.get_block_payloads(2)?;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].payload, Payload::new(2, 500));
    Ok(())
}

#[tokio::test]
async fn block_claimed_by_another_scanner_is_a_conflict() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-claimed-elsewhere")?;
    let store = Arc::new(HookedStore::new(IndexerStore::new(store_dir.path())?));
    let chain = Arc::new(FakeChain::with_empty_blocks(4));
    *store.claimed_elsewhere_at.lock().unwrap() = Some(2);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = Scanner::new(chain.clone(), store.clone(), GENESIS_HEIGHT);

    assert!(matches!(
        scanner.sync(&shutdown_rx).await,
        Err(ScanError::Height(HeightError::Conflict {
            expected: 1,
            actual: 2
        }))
    ));
    assert_eq!(scanner.tracker().get()?, 2);

    // picks up after the other writer's height
    assert_eq!(scanner.sync(&shutdown_rx).await?, 1);
    assert_eq!(chain.requested(), vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn scanners_sharing_a_store_never_repeat_blocks() -> anyhow::Result<()> {
    let store_dir = setup_new_db_dir("scanner-shared-store")?;
    let store = Arc::new(IndexerStore::new(store_dir.path())?);
    let chain = Arc::new(FakeChain::with_empty_blocks(4));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let first = scanner(chain.clone(), store.clone(), GENESIS_HEIGHT);
    let second = scanner(chain.clone(), store, GENESIS_HEIGHT);

    assert_eq!(first.sync(&shutdown_rx).await?, 3);
    assert_eq!(second.sync(&shutdown_rx).await?, 0);

    chain.push_block(vec![]);
    assert_eq!(second.sync(&shutdown_rx).await?, 1);
    assert_eq!(first.sync(&shutdown_rx).await?, 0);

    assert_eq!(chain.requested(), vec![1, 2, 3, 4]);
    assert_eq!(first.tracker().get()?, 4);
    Ok(())
}
