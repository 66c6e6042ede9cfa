//! Per-message view over the ledger tables.

use crate::errors::{LedgerError, Result};
use crate::params::Params;
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::Height;

/// Mutable view over the store for one message or one block hook.
///
/// Each resource module (deposit, node, plan, subscription, quota, session)
/// adds its own `impl Ledger` block. The store handed in is normally a
/// [`bwhub_storage::CacheStore`], so nothing a `Ledger` writes is visible
/// until the caller commits.
pub struct Ledger<'s> {
    store: &'s mut dyn KvStore,
    params: &'s Params,
    height: Height,
}

impl<'s> Ledger<'s> {
    pub fn new(store: &'s mut dyn KvStore, params: &'s Params, height: Height) -> Self {
        Self {
            store,
            params,
            height,
        }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn params(&self) -> &Params {
        self.params
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut dyn KvStore {
        &mut *self.store
    }

    /// Increment the counter stored under `key` and return the new value.
    /// Ids start at 1; the counter lives in the same store as the entities so
    /// it commits or rolls back with them.
    pub(crate) fn next_sequence(&mut self, key: &[u8]) -> Result<u64> {
        let current = self.store.get_u64(key)?.unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidState("sequence exhausted".into()))?;
        self.store.set_u64(key, next)?;
        Ok(next)
    }
}
