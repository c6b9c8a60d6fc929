use crate::{
    block::{store::PayloadStore, BlockPayload},
    constants::U32_LEN,
    height::store::HeightStore,
};
use anyhow::{anyhow, bail, Context};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, WriteBatch, DB};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::trace;

#[derive(Debug)]
pub struct IndexerStore {
    pub db_path: PathBuf,
    pub database: DB,
    pub is_primary: bool,
    height_lock: Mutex<()>,
}

impl IndexerStore {
    const COLUMN_FAMILIES: [&'static str; 2] = ["heights", "payloads"];
    const MAX_PROCESSED_HEIGHT_KEY: &'static [u8] = "max_processed_height".as_bytes();

    /// Creates a new _primary_ indexer store
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let mut cf_opts = rocksdb::Options::default();
        cf_opts.set_max_write_buffer_number(16);

        let mut database_opts = rocksdb::Options::default();
        database_opts.create_missing_column_families(true);
        database_opts.create_if_missing(true);

        let column_families: Vec<ColumnFamilyDescriptor> = Self::COLUMN_FAMILIES
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();
        let database = DB::open_cf_descriptors(&database_opts, path, column_families)?;
        Ok(Self {
            db_path: PathBuf::from(path),
            database,
            is_primary: true,
            height_lock: Mutex::new(()),
        })
    }

    /// Opens an existing store read-only, safe alongside a running primary
    pub fn new_read_only(path: &Path) -> anyhow::Result<Self> {
        let database_opts = rocksdb::Options::default();
        let database =
            DB::open_cf_for_read_only(&database_opts, path, Self::COLUMN_FAMILIES, false)?;
        Ok(Self {
            db_path: PathBuf::from(path),
            database,
            is_primary: false,
            height_lock: Mutex::new(()),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn heights_cf(&self) -> anyhow::Result<&ColumnFamily> {
        self.database
            .cf_handle("heights")
            .context("heights column family exists")
    }

    fn payloads_cf(&self) -> anyhow::Result<&ColumnFamily> {
        self.database
            .cf_handle("payloads")
            .context("payloads column family exists")
    }

    fn ensure_primary(&self) -> anyhow::Result<()> {
        if !self.is_primary {
            bail!(
                "store at {} was opened read-only",
                self.db_path.display()
            );
        }
        Ok(())
    }
}

impl HeightStore for IndexerStore {
    fn get_max_processed_height(&self) -> anyhow::Result<Option<u32>> {
        trace!("Getting max processed height");
        match self
            .database
            .get_pinned_cf(self.heights_cf()?, Self::MAX_PROCESSED_HEIGHT_KEY)?
        {
            None => Ok(None),
            Some(bytes) => Ok(Some(from_be_bytes(&bytes)?)),
        }
    }

    fn set_max_processed_height(&self, height: u32) -> anyhow::Result<()> {
        trace!("Setting max processed height to {height}");
        self.ensure_primary()?;

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(true);
        self.database.put_cf_opt(
            self.heights_cf()?,
            Self::MAX_PROCESSED_HEIGHT_KEY,
            height.to_be_bytes(),
            &write_opts,
        )?;
        Ok(())
    }

    fn compare_and_set_max_processed_height(
        &self,
        expected: Option<u32>,
        height: u32,
    ) -> anyhow::Result<bool> {
        let _guard = self
            .height_lock
            .lock()
            .map_err(|_| anyhow!("max processed height lock poisoned"))?;

        let stored = self.get_max_processed_height()?;
        if stored != expected {
            trace!("Max processed height is {stored:?}, not {expected:?}");
            return Ok(false);
        }
        self.set_max_processed_height(height)?;
        Ok(true)
    }
}

impl PayloadStore for IndexerStore {
    fn add_block_payloads(&self, height: u32, payloads: &[BlockPayload]) -> anyhow::Result<()> {
        trace!("Adding {} payloads at height {height}", payloads.len());
        self.ensure_primary()?;

        let payloads_cf = self.payloads_cf()?;
        let mut batch = WriteBatch::default();

        // drop whatever an earlier application of this block left behind
        for key in self.payload_keys_at_height(height)? {
            batch.delete_cf(payloads_cf, key);
        }
        for block_payload in payloads {
            if block_payload.height != height {
                bail!(
                    "payload from {}:{} is at height {}, not {height}",
                    block_payload.txid,
                    block_payload.vout,
                    block_payload.height
                );
            }
            batch.put_cf(
                payloads_cf,
                block_payload.key(),
                serde_json::to_vec(block_payload)?,
            );
        }

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(true);
        self.database.write_opt(batch, &write_opts)?;
        Ok(())
    }

    fn get_block_payloads(&self, height: u32) -> anyhow::Result<Vec<BlockPayload>> {
        trace!("Getting payloads at height {height}");
        let prefix = height.to_be_bytes();
        let mut payloads = vec![];

        for item in self.database.iterator_cf(
            self.payloads_cf()?,
            IteratorMode::From(&prefix, Direction::Forward),
        ) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            payloads.push(serde_json::from_slice(&value)?);
        }
        Ok(payloads)
    }
}

impl IndexerStore {
    fn payload_keys_at_height(&self, height: u32) -> anyhow::Result<Vec<Box<[u8]>>> {
        let prefix = height.to_be_bytes();
        let mut keys = vec![];

        for item in self.database.iterator_cf(
            self.payloads_cf()?,
            IteratorMode::From(&prefix, Direction::Forward),
        ) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Decodes a big-endian `u32` value
pub fn from_be_bytes(bytes: &[u8]) -> anyhow::Result<u32> {
    let bytes: [u8; U32_LEN] = bytes
        .try_into()
        .with_context(|| format!("expected {U32_LEN} bytes, found {}", bytes.len()))?;
    Ok(u32::from_be_bytes(bytes))
}
