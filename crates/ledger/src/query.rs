//! Read-only queries over committed state.

use crate::deposit::{get_deposit, get_deposits, Deposit};
use crate::errors::{LedgerError, Result};
use crate::node::{get_node, get_nodes, Node};
use crate::plan::{get_plan, get_plan_nodes, get_plans, get_plans_for_provider, Plan};
use crate::quota::{get_quota, get_quotas, Quota};
use crate::session::{get_session, Session};
use crate::subscription::{
    get_subscription, get_subscription_ids_for_address, get_subscription_ids_for_node,
    get_subscriptions, Subscription,
};
use bwhub_storage::KvStore;
use bwhub_types::{Address, NodeAddress};
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_LIMIT: usize = 100;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: MAX_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Result<Self> {
        let request = Self { page, limit };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(LedgerError::InvalidField("page"));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(LedgerError::InvalidField("limit"));
        }
        Ok(())
    }

    fn slice<T>(&self, items: Vec<T>) -> Result<Page<T>> {
        self.validate()?;
        let total = items.len();
        let items = items
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.limit))
            .take(self.limit)
            .collect();
        Ok(Page { items, total })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching entries across all pages.
    pub total: usize,
}

/// Read-only view. Lists are ascending by key, so repeated queries against
/// the same state return the same pages.
pub struct Querier<'s> {
    store: &'s dyn KvStore,
}

impl<'s> Querier<'s> {
    pub fn new(store: &'s dyn KvStore) -> Self {
        Self { store }
    }

    pub fn deposit(&self, address: &Address) -> Result<Option<Deposit>> {
        get_deposit(self.store, address)
    }

    pub fn deposits(&self, page: PageRequest) -> Result<Page<Deposit>> {
        page.slice(get_deposits(self.store)?)
    }

    pub fn node(&self, address: &NodeAddress) -> Result<Option<Node>> {
        get_node(self.store, address)
    }

    pub fn nodes(&self, page: PageRequest) -> Result<Page<Node>> {
        page.slice(get_nodes(self.store)?)
    }

    /// Nodes sold through `provider` or operated by it as self-priced nodes.
    pub fn nodes_for_provider(&self, provider: &Address, page: PageRequest) -> Result<Page<Node>> {
        let nodes = get_nodes(self.store)?
            .into_iter()
            .filter(|node| node.belongs_to(provider))
            .collect();
        page.slice(nodes)
    }

    pub fn plan(&self, id: u64) -> Result<Option<Plan>> {
        get_plan(self.store, id)
    }

    pub fn plans(&self, page: PageRequest) -> Result<Page<Plan>> {
        page.slice(get_plans(self.store)?)
    }

    pub fn plans_for_provider(&self, provider: &Address, page: PageRequest) -> Result<Page<Plan>> {
        page.slice(get_plans_for_provider(self.store, provider)?)
    }

    pub fn plan_nodes(&self, id: u64, page: PageRequest) -> Result<Page<NodeAddress>> {
        if get_plan(self.store, id)?.is_none() {
            return Err(LedgerError::not_found("plan", id));
        }
        page.slice(get_plan_nodes(self.store, id)?)
    }

    pub fn subscription(&self, id: u64) -> Result<Option<Subscription>> {
        get_subscription(self.store, id)
    }

    pub fn subscriptions(&self, page: PageRequest) -> Result<Page<Subscription>> {
        page.slice(get_subscriptions(self.store)?)
    }

    fn load_subscriptions(&self, ids: Vec<u64>) -> Result<Vec<Subscription>> {
        let mut subscriptions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(subscription) = get_subscription(self.store, id)? {
                subscriptions.push(subscription);
            }
        }
        Ok(subscriptions)
    }

    pub fn subscriptions_for_address(
        &self,
        address: &Address,
        page: PageRequest,
    ) -> Result<Page<Subscription>> {
        let ids = get_subscription_ids_for_address(self.store, address)?;
        page.slice(self.load_subscriptions(ids)?)
    }

    pub fn subscriptions_for_node(
        &self,
        node: &NodeAddress,
        page: PageRequest,
    ) -> Result<Page<Subscription>> {
        let ids = get_subscription_ids_for_node(self.store, node)?;
        page.slice(self.load_subscriptions(ids)?)
    }

    pub fn quota(&self, id: u64, address: &Address) -> Result<Option<Quota>> {
        get_quota(self.store, id, address)
    }

    pub fn quotas(&self, id: u64, page: PageRequest) -> Result<Page<Quota>> {
        page.slice(get_quotas(self.store, id)?)
    }

    pub fn session(
        &self,
        id: u64,
        node: &NodeAddress,
        address: &Address,
    ) -> Result<Option<Session>> {
        get_session(self.store, id, node, address)
    }
}
