//! ScanStore trait and RocksDB implementation
//!
//! Holds one `ScanState` per (checker, address). The in-memory LRU store
//! lives in `cache.rs`; this module adds a persistent RocksDB store so
//! incremental scans survive process restarts.

use crate::keys::{decode_scan_key, encode_checker_prefix, encode_scan_key};
use crate::records::ScanState;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::path::Path;

const SCAN_STATE_CF: &str = "scan_state";

/// Storage for per-(checker, address) scan state.
///
/// Implementations must be shareable across tasks; checkers hold them
/// behind an `Arc`.
pub trait ScanStore: Send + Sync {
    /// Get the scan state of an address for a checker.
    fn get(&self, checker: &str, addr: Address) -> Result<Option<ScanState>>;

    /// Store the scan state of an address for a checker.
    fn put(&self, checker: &str, addr: Address, state: &ScanState) -> Result<()>;

    /// Remove one entry. Returns true if something was removed.
    fn remove(&self, checker: &str, addr: Address) -> Result<bool>;

    /// Remove every entry of a checker. Returns the number removed.
    fn clear_checker(&self, checker: &str) -> Result<usize>;
}

/// RocksDB-backed implementation of ScanStore.
pub struct RocksScanStore {
    db: DB,
}

impl RocksScanStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let column_families = vec![ColumnFamilyDescriptor::new(
            SCAN_STATE_CF,
            Options::default(),
        )];

        let db = DB::open_cf_descriptors(&opts, path, column_families)
            .context("Failed to open RocksDB database")?;

        Ok(Self { db })
    }

    /// Get a column family handle by name.
    fn get_cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("Column family '{}' not found", name))
    }

    /// List the addresses with stored state for a checker.
    pub fn addresses(&self, checker: &str) -> Result<Vec<Address>> {
        let cf = self.get_cf(SCAN_STATE_CF)?;
        let prefix = encode_checker_prefix(checker);
        let iter = self.db.iterator_cf(
            cf,
            rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut addrs = Vec::new();
        for item in iter {
            let (key, _) = item.context("Failed to read iterator")?;
            if !key.starts_with(&prefix) {
                break;
            }
            let (_, addr) = decode_scan_key(&key).context("Failed to decode scan key")?;
            addrs.push(addr);
        }
        Ok(addrs)
    }
}

impl ScanStore for RocksScanStore {
    fn get(&self, checker: &str, addr: Address) -> Result<Option<ScanState>> {
        let cf = self.get_cf(SCAN_STATE_CF)?;
        let key = encode_scan_key(checker, addr);
        match self.db.get_cf(cf, &key).context("Failed to get scan state")? {
            Some(bytes) => {
                let state = postcard::from_bytes(&bytes)
                    .context("Failed to deserialize scan state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn put(&self, checker: &str, addr: Address, state: &ScanState) -> Result<()> {
        let cf = self.get_cf(SCAN_STATE_CF)?;
        let key = encode_scan_key(checker, addr);
        let value = postcard::to_allocvec(state).context("Failed to serialize scan state")?;
        self.db
            .put_cf(cf, &key, &value)
            .context("Failed to put scan state")?;
        Ok(())
    }

    fn remove(&self, checker: &str, addr: Address) -> Result<bool> {
        let cf = self.get_cf(SCAN_STATE_CF)?;
        let key = encode_scan_key(checker, addr);
        let existed = self
            .db
            .get_pinned_cf(cf, &key)
            .context("Failed to get scan state")?
            .is_some();
        if existed {
            self.db
                .delete_cf(cf, &key)
                .context("Failed to delete scan state")?;
        }
        Ok(existed)
    }

    fn clear_checker(&self, checker: &str) -> Result<usize> {
        let addrs = self.addresses(checker)?;
        let cf = self.get_cf(SCAN_STATE_CF)?;
        let mut batch = WriteBatch::default();
        for addr in &addrs {
            batch.delete_cf(cf, encode_scan_key(checker, *addr));
        }
        self.db
            .write(batch)
            .context("Failed to clear scan states")?;
        Ok(addrs.len())
    }
}
