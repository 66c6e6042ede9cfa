//! Cache-and-commit transaction over a parent store.

use crate::{BatchOp, KvStore, Result};
use std::collections::BTreeMap;

/// Buffers every write over `parent` until [`CacheStore::write`].
///
/// Reads observe buffered writes first. Dropping the cache without calling
/// `write` discards the buffer, leaving the parent untouched.
pub struct CacheStore<'a, S: KvStore + ?Sized> {
    parent: &'a mut S,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> CacheStore<'a, S> {
    pub fn new(parent: &'a mut S) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Number of buffered puts and deletes.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Flush the buffer into the parent as one batch.
    pub fn write(self) -> Result<()> {
        let CacheStore { parent, pending } = self;
        if pending.is_empty() {
            return Ok(());
        }
        let batch: Vec<BatchOp> = pending.into_iter().collect();
        parent.apply(batch)
    }
}

impl<'a, S: KvStore + ?Sized> KvStore for CacheStore<'a, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.pending.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.pending.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.scan_prefix(prefix)?.into_iter().collect();
        for (key, value) in self
            .pending
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn apply(&mut self, batch: Vec<BatchOp>) -> Result<()> {
        self.pending.extend(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn writes_are_invisible_until_committed() {
        let mut parent = MemoryStore::new();
        parent.set(b"a", b"1".to_vec()).unwrap();

        let mut cache = CacheStore::new(&mut parent);
        cache.set(b"a", b"2".to_vec()).unwrap();
        cache.set(b"b", b"3".to_vec()).unwrap();
        assert_eq!(cache.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.pending_writes(), 2);
        drop(cache);

        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"b").unwrap(), None);
    }

    #[test]
    fn write_flushes_puts_and_deletes() {
        let mut parent = MemoryStore::new();
        parent.set(b"a", b"1".to_vec()).unwrap();

        let mut cache = CacheStore::new(&mut parent);
        cache.delete(b"a").unwrap();
        cache.set(b"b", b"2".to_vec()).unwrap();
        assert_eq!(cache.get(b"a").unwrap(), None);
        cache.write().unwrap();

        assert_eq!(parent.get(b"a").unwrap(), None);
        assert_eq!(parent.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn scan_merges_buffer_over_parent() {
        let mut parent = MemoryStore::new();
        parent.set(&[1, 1], b"p1".to_vec()).unwrap();
        parent.set(&[1, 2], b"p2".to_vec()).unwrap();
        parent.set(&[2, 0], b"other".to_vec()).unwrap();

        let mut cache = CacheStore::new(&mut parent);
        cache.delete(&[1, 1]).unwrap();
        cache.set(&[1, 3], b"c3".to_vec()).unwrap();
        cache.set(&[1, 2], b"c2".to_vec()).unwrap();

        let scanned = cache.scan_prefix(&[1]).unwrap();
        assert_eq!(
            scanned,
            vec![(vec![1, 2], b"c2".to_vec()), (vec![1, 3], b"c3".to_vec())]
        );
    }

    #[test]
    fn nested_caches_commit_into_outer_only() {
        let mut parent = MemoryStore::new();
        let mut outer = CacheStore::new(&mut parent);
        {
            let mut inner = CacheStore::new(&mut outer);
            inner.set(b"kept", b"1".to_vec()).unwrap();
            inner.write().unwrap();
        }
        {
            let mut inner = CacheStore::new(&mut outer);
            inner.set(b"dropped", b"1".to_vec()).unwrap();
        }
        assert!(outer.has(b"kept").unwrap());
        assert!(!outer.has(b"dropped").unwrap());
        outer.write().unwrap();
        assert!(parent.has(b"kept").unwrap());
        assert_eq!(parent.len(), 1);
    }
}
