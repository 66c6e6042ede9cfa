//! Ordered key/value storage for the bwhub ledger.
//!
//! Every ledger table lives in one flat, byte-ordered keyspace. Backends only
//! need point reads, point writes, prefix scans in ascending key order and an
//! atomic batch apply; [`CacheStore`] layers the per-message
//! cache-and-commit transaction on top of any of them.

use serde::{de::DeserializeOwned, Serialize};

pub mod cache;
pub mod memory;
pub mod sled_store;

pub use cache::CacheStore;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Backend(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupted entry under key {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A pending write: `Some(value)` puts, `None` deletes.
pub type BatchOp = (Vec<u8>, Option<Vec<u8>>);

/// Abstract ordered key/value store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// All entries whose key starts with `prefix`, ascending by key.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply a batch of writes. Backends with native batches override this to
    /// make the whole batch atomic.
    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        for (key, value) in batch {
            match value {
                Some(value) => self.set(&key, value)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// JSON helpers for typed values, available on every [`KvStore`].
pub trait KvStoreExt: KvStore {
    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.get(key)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn set_json<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.set(key, data)
    }

    /// Decode every value under `prefix`, ascending by key.
    fn scan_json<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        self.scan_prefix(prefix)?
            .into_iter()
            .map(|(_, v)| serde_json::from_slice(&v).map_err(Into::into))
            .collect()
    }

    fn get_u64(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.get(key)? {
            Some(v) => {
                let bytes: [u8; 8] =
                    v.as_slice()
                        .try_into()
                        .map_err(|_| StorageError::Corrupted {
                            key: hex::encode(key),
                            reason: format!("expected 8 bytes, found {}", v.len()),
                        })?;
                Ok(Some(u64::from_be_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    fn set_u64(&mut self, key: &[u8], value: u64) -> Result<()> {
        self.set(key, value.to_be_bytes().to_vec())
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

/// Exclusive upper bound of the keys starting with `prefix`, or `None` if the
/// prefix is all `0xff` (unbounded).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(&[0x10, 0x01]), Some(vec![0x10, 0x02]));
        assert_eq!(prefix_end(&[0x10, 0xff]), Some(vec![0x11]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }

    #[test]
    fn json_and_u64_helpers() {
        let mut store = MemoryStore::new();
        store.set_json(b"k", &vec![1u32, 2, 3]).unwrap();
        assert_eq!(store.get_json::<Vec<u32>>(b"k").unwrap(), Some(vec![1, 2, 3]));
        store.set_u64(b"n", 42).unwrap();
        assert_eq!(store.get_u64(b"n").unwrap(), Some(42));
        store.set(b"bad", vec![1, 2]).unwrap();
        assert!(matches!(
            store.get_u64(b"bad"),
            Err(StorageError::Corrupted { .. })
        ));
    }
}
