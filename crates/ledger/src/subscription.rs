//! Subscription ledger.
//!
//! A subscription is bought either against a plan (shared quota paid up
//! front through the bank) or against a single self-priced node (pay per
//! byte out of a reserve taken from the owner's deposit). `Inactive` is
//! terminal.

use crate::bank::Bank;
use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use crate::msg::{
    MsgAddQuotaForSubscription, MsgEndSubscription, MsgStartSubscription,
    MsgUpdateQuotaForSubscription, SubscriptionTarget,
};
use crate::quota::{get_quotas, sum_allocated, Quota};
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Bandwidth, Coin, Coins, Height, NodeAddress, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionKind {
    Plan {
        plan_id: u64,
        /// What the owner paid.
        price: Coin,
        /// Copied from the plan at start.
        total_quota: Bandwidth,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<Height>,
    },
    Node {
        node: NodeAddress,
        /// Price per byte, snapshotted at start.
        unit_price: Coin,
        /// Amount reserved from the owner's deposit at start.
        deposit: Coin,
        /// Unspent reserve. After the subscription ends this is the amount
        /// that was refunded.
        remaining: Coin,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: u64,
    pub owner: Address,
    pub kind: SubscriptionKind,
    pub status: Status,
    pub status_at: Height,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn plan_id(&self) -> Option<u64> {
        match &self.kind {
            SubscriptionKind::Plan { plan_id, .. } => Some(*plan_id),
            SubscriptionKind::Node { .. } => None,
        }
    }

    pub fn node(&self) -> Option<&NodeAddress> {
        match &self.kind {
            SubscriptionKind::Node { node, .. } => Some(node),
            SubscriptionKind::Plan { .. } => None,
        }
    }

    pub fn is_expired(&self, height: Height) -> bool {
        match &self.kind {
            SubscriptionKind::Plan {
                expires_at: Some(expires_at),
                ..
            } => height >= *expires_at,
            _ => false,
        }
    }

    /// Active and, for plan-based subscriptions, not past expiry.
    pub(crate) fn ensure_usable(&self, height: Height) -> Result<()> {
        if !self.is_active() {
            return Err(LedgerError::InvalidState(format!(
                "subscription {} is not active",
                self.id
            )));
        }
        if self.is_expired(height) {
            return Err(LedgerError::InvalidState(format!(
                "subscription {} expired",
                self.id
            )));
        }
        Ok(())
    }
}

/// Outcome of closing a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSubscription {
    pub id: u64,
    pub owner: Address,
    /// Reserve returned to the owner's deposit, node-based only.
    pub refund: Option<Coin>,
}

pub fn get_subscription(store: &dyn KvStore, id: u64) -> Result<Option<Subscription>> {
    Ok(store.get_json(&keys::subscription_key(id))?)
}

/// All subscriptions, ascending by id.
pub fn get_subscriptions(store: &dyn KvStore) -> Result<Vec<Subscription>> {
    Ok(store.scan_json(&[keys::SUBSCRIPTION_PREFIX])?)
}

fn ids_under(store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<u64>> {
    Ok(store
        .scan_prefix(prefix)?
        .into_iter()
        .filter_map(|(key, _)| keys::id_from_key_suffix(&key))
        .collect())
}

pub fn get_subscription_ids_for_address(store: &dyn KvStore, address: &Address) -> Result<Vec<u64>> {
    ids_under(store, &keys::subscription_for_address_prefix(address))
}

/// Ids of the live node-based subscriptions on `node`.
pub fn get_subscription_ids_for_node(store: &dyn KvStore, node: &NodeAddress) -> Result<Vec<u64>> {
    ids_under(store, &keys::subscription_for_node_prefix(node))
}

impl Ledger<'_> {
    pub fn subscription(&self, id: u64) -> Result<Option<Subscription>> {
        get_subscription(self.store(), id)
    }

    pub(crate) fn require_subscription(&self, id: u64) -> Result<Subscription> {
        self.subscription(id)?
            .ok_or_else(|| LedgerError::not_found("subscription", id))
    }

    pub(crate) fn set_subscription(&mut self, subscription: &Subscription) -> Result<()> {
        self.store_mut()
            .set_json(&keys::subscription_key(subscription.id), subscription)?;
        Ok(())
    }

    pub fn start_subscription(
        &mut self,
        bank: &mut dyn Bank,
        owner: &Address,
        msg: &MsgStartSubscription,
    ) -> Result<Subscription> {
        match msg.validate_basic()? {
            SubscriptionTarget::Plan { id, denom } => self.start_plan_subscription(bank, owner, id, &denom),
            SubscriptionTarget::Node { address, deposit } => {
                self.start_node_subscription(owner, &address, deposit)
            }
        }
    }

    fn start_plan_subscription(
        &mut self,
        bank: &mut dyn Bank,
        owner: &Address,
        plan_id: u64,
        denom: &str,
    ) -> Result<Subscription> {
        let plan = self.require_plan(plan_id)?;
        if !plan.status.is_active() {
            return Err(LedgerError::InvalidState(format!("plan {plan_id} is not active")));
        }
        let price = plan.price.coin_of(denom);
        if price.is_zero() {
            return Err(LedgerError::InvalidField("denom"));
        }
        let payment = Coins::from(price.clone());
        let balance = bank.balance(owner);
        if !balance.is_all_gte(&payment) {
            return Err(LedgerError::insufficient(&payment, &balance));
        }

        let id = self.next_sequence(keys::SUBSCRIPTION_COUNT_KEY)?;
        let subscription = Subscription {
            id,
            owner: *owner,
            kind: SubscriptionKind::Plan {
                plan_id,
                price,
                total_quota: plan.bandwidth,
                expires_at: plan.expiry_for(self.height()),
            },
            status: Status::Active,
            status_at: self.height(),
        };
        self.set_subscription(&subscription)?;
        self.store_mut()
            .set(&keys::subscription_for_address_key(owner, id), Vec::new())?;

        bank.debit(owner, &payment)?;
        bank.credit(&plan.provider, &payment)?;
        info!(subscription = id, plan = plan_id, owner = %owner, paid = %payment, "plan subscription started");
        Ok(subscription)
    }

    fn start_node_subscription(
        &mut self,
        owner: &Address,
        address: &NodeAddress,
        deposit: Coin,
    ) -> Result<Subscription> {
        let node = self.require_node(address)?;
        if !node.is_active() {
            return Err(LedgerError::InvalidState(format!("node {address} is not active")));
        }
        let unit_price = node
            .unit_price(&deposit.denom)
            .ok_or(LedgerError::InvalidField("deposit"))?;
        let units = deposit.amount / unit_price;
        if units == 0 {
            return Err(LedgerError::InvalidField("deposit"));
        }
        let units = u64::try_from(units).unwrap_or(u64::MAX);

        self.subtract_deposit(owner, &Coins::from(deposit.clone()))?;

        let id = self.next_sequence(keys::SUBSCRIPTION_COUNT_KEY)?;
        let subscription = Subscription {
            id,
            owner: *owner,
            kind: SubscriptionKind::Node {
                node: *address,
                unit_price: Coin::new(deposit.denom.clone(), unit_price),
                deposit: deposit.clone(),
                remaining: deposit,
            },
            status: Status::Active,
            status_at: self.height(),
        };
        self.set_subscription(&subscription)?;
        self.store_mut()
            .set(&keys::subscription_for_address_key(owner, id), Vec::new())?;
        self.store_mut()
            .set(&keys::subscription_for_node_key(address, id), Vec::new())?;
        self.set_quota(id, &Quota::new(*owner, Bandwidth::new(units, units)))?;
        info!(subscription = id, node = %address, owner = %owner, "node subscription started");
        Ok(subscription)
    }

    /// Plan-based subscription that the signer may manage quotas on.
    fn quota_subscription(&self, signer: &Address, id: u64) -> Result<(Subscription, Bandwidth)> {
        let subscription = self.require_subscription(id)?;
        subscription.ensure_usable(self.height())?;
        let SubscriptionKind::Plan {
            plan_id,
            total_quota,
            ..
        } = &subscription.kind
        else {
            return Err(LedgerError::InvalidState(format!(
                "subscription {id} is node-based"
            )));
        };

        if &subscription.owner != signer {
            let plan = self.require_plan(*plan_id)?;
            if &plan.provider != signer {
                return Err(LedgerError::Unauthorized(format!(
                    "{signer} may not manage quotas of subscription {id}"
                )));
            }
        }
        let total_quota = *total_quota;
        Ok((subscription, total_quota))
    }

    fn check_total_quota(
        &self,
        id: u64,
        address: &Address,
        allocated: Bandwidth,
        total_quota: Bandwidth,
    ) -> Result<()> {
        let mut others: Vec<Quota> = get_quotas(self.store(), id)?;
        others.retain(|quota| &quota.address != address);
        let sum = sum_allocated(&others)
            .and_then(|sum| sum.checked_add(&allocated))
            .filter(|sum| sum.is_all_lte(&total_quota))
            .ok_or_else(|| {
                LedgerError::QuotaExceeded(format!(
                    "allocations of subscription {id} would exceed {total_quota}"
                ))
            })?;
        debug!(subscription = id, allocated = %sum, total = %total_quota, "quota sum checked");
        Ok(())
    }

    /// Grant `msg.bandwidth` more to a consumer, creating the row if needed.
    pub fn add_quota(&mut self, signer: &Address, msg: &MsgAddQuotaForSubscription) -> Result<Quota> {
        msg.validate_basic()?;
        let (subscription, total_quota) = self.quota_subscription(signer, msg.id)?;
        let mut quota = self
            .quota(subscription.id, &msg.address)?
            .unwrap_or_else(|| Quota::new(msg.address, Bandwidth::ZERO));
        quota.allocated = quota.allocated.checked_add(&msg.bandwidth).ok_or_else(|| {
            LedgerError::QuotaExceeded(format!("allocation overflow on subscription {}", msg.id))
        })?;
        self.check_total_quota(subscription.id, &msg.address, quota.allocated, total_quota)?;
        self.set_quota(subscription.id, &quota)?;
        Ok(quota)
    }

    /// Replace a consumer's allocation. Never drops below what is consumed.
    pub fn update_quota(
        &mut self,
        signer: &Address,
        msg: &MsgUpdateQuotaForSubscription,
    ) -> Result<Quota> {
        msg.validate_basic()?;
        let (subscription, total_quota) = self.quota_subscription(signer, msg.id)?;
        let mut quota = self.require_quota(subscription.id, &msg.address)?;
        if !quota.consumed.is_all_lte(&msg.bandwidth) {
            return Err(LedgerError::InvalidField("bandwidth"));
        }
        self.check_total_quota(subscription.id, &msg.address, msg.bandwidth, total_quota)?;
        quota.allocated = msg.bandwidth;
        self.set_quota(subscription.id, &quota)?;
        Ok(quota)
    }

    /// Owner-requested end. Ending an inactive subscription succeeds without
    /// changing anything and returns `None`.
    pub fn end_subscription(
        &mut self,
        signer: &Address,
        msg: &MsgEndSubscription,
    ) -> Result<Option<EndedSubscription>> {
        msg.validate_basic()?;
        let subscription = self.require_subscription(msg.id)?;
        if &subscription.owner != signer {
            return Err(LedgerError::Unauthorized(format!(
                "{signer} is not the owner of subscription {}",
                msg.id
            )));
        }
        if !subscription.is_active() {
            debug!(subscription = msg.id, "subscription already inactive");
            return Ok(None);
        }
        self.close_subscription(subscription).map(Some)
    }

    /// Move an active subscription to `Inactive`, refund the unspent reserve
    /// of a node-based one into the owner's deposit and drop its quota rows.
    pub(crate) fn close_subscription(
        &mut self,
        mut subscription: Subscription,
    ) -> Result<EndedSubscription> {
        subscription.status = Status::Inactive;
        subscription.status_at = self.height();

        let refund = match &subscription.kind {
            SubscriptionKind::Node {
                node, remaining, ..
            } => {
                self.store_mut()
                    .delete(&keys::subscription_for_node_key(node, subscription.id))?;
                if !remaining.is_zero() {
                    self.add_deposit(&subscription.owner, &Coins::from(remaining.clone()))?;
                }
                Some(remaining.clone())
            }
            SubscriptionKind::Plan { .. } => None,
        };
        self.remove_quotas(subscription.id)?;
        self.set_subscription(&subscription)?;

        info!(
            subscription = subscription.id,
            owner = %subscription.owner,
            refund = ?refund.as_ref().map(ToString::to_string),
            "subscription ended"
        );
        Ok(EndedSubscription {
            id: subscription.id,
            owner: subscription.owner,
            refund,
        })
    }

    /// Force-end every live node-based subscription on `node`, ascending by id.
    pub(crate) fn end_subscriptions_for_node(
        &mut self,
        node: &NodeAddress,
    ) -> Result<Vec<EndedSubscription>> {
        let mut ended = Vec::new();
        for id in get_subscription_ids_for_node(self.store(), node)? {
            let subscription = self.require_subscription(id)?;
            if subscription.is_active() {
                ended.push(self.close_subscription(subscription)?);
            }
        }
        Ok(ended)
    }
}
