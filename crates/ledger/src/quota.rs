//! Per-address bandwidth allocations inside a subscription.

use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Bandwidth};
use serde::{Deserialize, Serialize};

/// `consumed <= allocated` holds in both directions at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub address: Address,
    pub allocated: Bandwidth,
    pub consumed: Bandwidth,
}

impl Quota {
    pub fn new(address: Address, allocated: Bandwidth) -> Self {
        Self {
            address,
            allocated,
            consumed: Bandwidth::ZERO,
        }
    }

    pub fn remaining(&self) -> Bandwidth {
        self.allocated
            .checked_sub(&self.consumed)
            .unwrap_or(Bandwidth::ZERO)
    }
}

pub fn get_quota(store: &dyn KvStore, id: u64, address: &Address) -> Result<Option<Quota>> {
    Ok(store.get_json(&keys::quota_key(id, address))?)
}

/// Quotas of a subscription, ascending by address.
pub fn get_quotas(store: &dyn KvStore, id: u64) -> Result<Vec<Quota>> {
    Ok(store.scan_json(&keys::quota_prefix(id))?)
}

/// Sum of all allocations of a subscription, `None` on overflow.
pub(crate) fn sum_allocated(quotas: &[Quota]) -> Option<Bandwidth> {
    quotas
        .iter()
        .try_fold(Bandwidth::ZERO, |sum, quota| sum.checked_add(&quota.allocated))
}

impl Ledger<'_> {
    pub fn quota(&self, id: u64, address: &Address) -> Result<Option<Quota>> {
        get_quota(self.store(), id, address)
    }

    pub(crate) fn require_quota(&self, id: u64, address: &Address) -> Result<Quota> {
        self.quota(id, address)?
            .ok_or_else(|| LedgerError::not_found("quota", format!("{id}/{address}")))
    }

    pub(crate) fn set_quota(&mut self, id: u64, quota: &Quota) -> Result<()> {
        self.store_mut()
            .set_json(&keys::quota_key(id, &quota.address), quota)?;
        Ok(())
    }

    pub(crate) fn remove_quotas(&mut self, id: u64) -> Result<usize> {
        let rows = self.store().scan_prefix(&keys::quota_prefix(id))?;
        for (key, _) in &rows {
            self.store_mut().delete(key)?;
        }
        Ok(rows.len())
    }
}
