use crate::{BatchOp, KvStore, Result};
use sled::{Batch, Db, Tree};
use std::path::Path;

/// Sled-backed implementation
///
/// All ledger tables share a single tree; batches are applied through
/// `sled::Batch` so a committed message lands on disk all at once.
pub struct SledStore {
    db: Db,
    state: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let state = db.open_tree("ledger_state")?;
        tracing::debug!(entries = state.len(), "opened sled ledger state");
        Ok(Self { db, state })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.state.get(key)?.map(|v| v.to_vec()))
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.state.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.state.remove(key)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.state
            .scan_prefix(prefix)
            .map(|item| {
                let (k, v) = item?;
                Ok((k.to_vec(), v.to_vec()))
            })
            .collect()
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        let mut sled_batch = Batch::default();
        for (key, value) in batch {
            match value {
                Some(value) => sled_batch.insert(key, value),
                None => sled_batch.remove(key),
            }
        }
        self.state.apply_batch(sled_batch)?;
        Ok(())
    }
}
