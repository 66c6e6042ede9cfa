//! Provider plans and plan membership.

use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use crate::msg::{MsgAddNodeForPlan, MsgAddPlan, MsgRemoveNodeForPlan, MsgSetPlanStatus};
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Bandwidth, Coins, Height, NodeAddress, Status};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: u64,
    pub provider: Address,
    pub price: Coins,
    /// Subscription lifetime in blocks, zero for unbounded.
    pub validity: u64,
    pub bandwidth: Bandwidth,
    pub status: Status,
    pub status_at: Height,
}

impl Plan {
    /// Height at which a subscription started at `start` stops accepting
    /// quota changes and usage.
    pub fn expiry_for(&self, start: Height) -> Option<Height> {
        match self.validity {
            0 => None,
            validity => Some(start.saturating_add(validity)),
        }
    }
}

pub fn get_plan(store: &dyn KvStore, id: u64) -> Result<Option<Plan>> {
    Ok(store.get_json(&keys::plan_key(id))?)
}

/// All plans, ascending by id.
pub fn get_plans(store: &dyn KvStore) -> Result<Vec<Plan>> {
    Ok(store.scan_json(&[keys::PLAN_PREFIX])?)
}

pub fn get_plans_for_provider(store: &dyn KvStore, provider: &Address) -> Result<Vec<Plan>> {
    Ok(get_plans(store)?
        .into_iter()
        .filter(|plan| &plan.provider == provider)
        .collect())
}

/// Member nodes of a plan, ascending by address.
pub fn get_plan_nodes(store: &dyn KvStore, id: u64) -> Result<Vec<NodeAddress>> {
    Ok(store
        .scan_prefix(&keys::plan_node_prefix(id))?
        .into_iter()
        .filter_map(|(key, _)| keys::node_from_key_suffix(&key))
        .collect())
}

pub fn has_plan_node(store: &dyn KvStore, id: u64, node: &NodeAddress) -> Result<bool> {
    Ok(store.has(&keys::plan_node_key(id, node))?)
}

impl Ledger<'_> {
    pub fn plan(&self, id: u64) -> Result<Option<Plan>> {
        get_plan(self.store(), id)
    }

    pub(crate) fn require_plan(&self, id: u64) -> Result<Plan> {
        self.plan(id)?.ok_or_else(|| LedgerError::not_found("plan", id))
    }

    fn set_plan(&mut self, plan: &Plan) -> Result<()> {
        self.store_mut().set_json(&keys::plan_key(plan.id), plan)?;
        Ok(())
    }

    fn require_provider(&self, plan: &Plan, signer: &Address) -> Result<()> {
        if &plan.provider != signer {
            return Err(LedgerError::Unauthorized(format!(
                "{signer} is not the provider of plan {}",
                plan.id
            )));
        }
        Ok(())
    }

    pub fn add_plan(&mut self, provider: &Address, msg: &MsgAddPlan) -> Result<Plan> {
        msg.validate_basic()?;
        let id = self.next_sequence(keys::PLAN_COUNT_KEY)?;
        let plan = Plan {
            id,
            provider: *provider,
            price: msg.price.clone(),
            validity: msg.validity,
            bandwidth: msg.bandwidth,
            status: self.params().plan_initial_status,
            status_at: self.height(),
        };
        self.set_plan(&plan)?;
        info!(plan = id, provider = %provider, price = %plan.price, "plan added");
        Ok(plan)
    }

    pub fn set_plan_status(&mut self, signer: &Address, msg: &MsgSetPlanStatus) -> Result<Plan> {
        msg.validate_basic()?;
        let mut plan = self.require_plan(msg.id)?;
        self.require_provider(&plan, signer)?;
        plan.status = msg.status;
        plan.status_at = self.height();
        self.set_plan(&plan)?;
        Ok(plan)
    }

    /// Attach a node to a plan. The node must belong to the plan's provider;
    /// adding a node that is already a member is a no-op.
    pub fn add_node_for_plan(&mut self, signer: &Address, msg: &MsgAddNodeForPlan) -> Result<bool> {
        msg.validate_basic()?;
        let plan = self.require_plan(msg.id)?;
        self.require_provider(&plan, signer)?;
        let node = self.require_node(&msg.node)?;
        if !node.belongs_to(&plan.provider) {
            return Err(LedgerError::InvalidField("node"));
        }

        let key = keys::plan_node_key(plan.id, &node.address);
        if self.store().has(&key)? {
            return Ok(false);
        }
        self.store_mut().set(&key, Vec::new())?;
        Ok(true)
    }

    pub fn remove_node_for_plan(
        &mut self,
        signer: &Address,
        msg: &MsgRemoveNodeForPlan,
    ) -> Result<()> {
        msg.validate_basic()?;
        let plan = self.require_plan(msg.id)?;
        self.require_provider(&plan, signer)?;

        let key = keys::plan_node_key(plan.id, &msg.node);
        if !self.store().has(&key)? {
            return Err(LedgerError::not_found("plan node", msg.node));
        }
        self.store_mut().delete(&key)?;
        Ok(())
    }
}
