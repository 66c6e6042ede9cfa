//! Node registry.
//!
//! A node starts `Active` at registration. Its `status_at` height doubles as
//! the heartbeat: every `SetNodeStatus` refreshes it, and the block sweep
//! deactivates nodes whose heartbeat falls outside the liveness window.
//! Active nodes are indexed by `(status_at, address)` so the sweep only
//! touches expired entries.

use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use crate::msg::{MsgRegisterNode, MsgSetNodeStatus, MsgUpdateNode, Pricing};
use crate::subscription::EndedSubscription;
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Bandwidth, Height, NodeAddress, NodeCategory, Status};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: NodeAddress,
    pub owner: Address,
    pub pricing: Pricing,
    pub internet_speed: Bandwidth,
    pub remote_url: String,
    pub version: String,
    pub category: NodeCategory,
    pub status: Status,
    pub status_at: Height,
}

impl Node {
    pub fn provider(&self) -> Option<&Address> {
        match &self.pricing {
            Pricing::Provider(provider) => Some(provider),
            Pricing::Price(_) => None,
        }
    }

    /// Per-byte price in `denom`, if the node is self-priced in it.
    pub fn unit_price(&self, denom: &str) -> Option<u128> {
        match &self.pricing {
            Pricing::Price(price) => Some(price.amount_of(denom)).filter(|p| *p > 0),
            Pricing::Provider(_) => None,
        }
    }

    /// A node belongs to `provider` when it is sold through that provider, or
    /// when the provider operates it as a self-priced node.
    pub fn belongs_to(&self, provider: &Address) -> bool {
        match &self.pricing {
            Pricing::Provider(p) => p == provider,
            Pricing::Price(_) => &self.owner == provider,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

pub fn get_node(store: &dyn KvStore, address: &NodeAddress) -> Result<Option<Node>> {
    Ok(store.get_json(&keys::node_key(address))?)
}

/// All nodes, ascending by address.
pub fn get_nodes(store: &dyn KvStore) -> Result<Vec<Node>> {
    Ok(store.scan_json(&[keys::NODE_PREFIX])?)
}

/// Active nodes whose heartbeat is older than the liveness window at
/// `height`, ascending by address. Index entries that cannot be decoded are
/// skipped.
pub fn get_expired_nodes(
    store: &dyn KvStore,
    height: Height,
    inactive_duration: Height,
) -> Result<Vec<NodeAddress>> {
    let mut expired = Vec::new();
    for (key, _) in store.scan_prefix(&[keys::ACTIVE_NODE_PREFIX])? {
        let (Some(status_at), Some(address)) = (
            keys::height_from_active_node_key(&key),
            keys::node_from_key_suffix(&key),
        ) else {
            tracing::warn!(key = %hex::encode(&key), "skipping malformed active node index entry");
            continue;
        };
        if status_at.saturating_add(inactive_duration) >= height {
            break;
        }
        expired.push(address);
    }
    expired.sort();
    expired.dedup();
    Ok(expired)
}

impl Ledger<'_> {
    pub fn node(&self, address: &NodeAddress) -> Result<Option<Node>> {
        get_node(self.store(), address)
    }

    pub(crate) fn require_node(&self, address: &NodeAddress) -> Result<Node> {
        self.node(address)?
            .ok_or_else(|| LedgerError::not_found("node", address))
    }

    fn set_node(&mut self, node: &Node) -> Result<()> {
        self.store_mut()
            .set_json(&keys::node_key(&node.address), node)?;
        Ok(())
    }

    fn set_active_index(&mut self, node: &Node) -> Result<()> {
        self.store_mut()
            .set(&keys::active_node_key(node.status_at, &node.address), Vec::new())?;
        Ok(())
    }

    fn clear_active_index(&mut self, node: &Node) -> Result<()> {
        self.store_mut()
            .delete(&keys::active_node_key(node.status_at, &node.address))?;
        Ok(())
    }

    pub fn register_node(&mut self, owner: &Address, msg: &MsgRegisterNode) -> Result<Node> {
        let pricing = msg.validate_basic(self.params())?;
        let sequence = self.next_sequence(keys::NODE_COUNT_KEY)?;
        let address = NodeAddress::derive(owner, sequence);
        if self.node(&address)?.is_some() {
            return Err(LedgerError::InvalidState(format!(
                "node {address} already registered"
            )));
        }

        let node = Node {
            address,
            owner: *owner,
            pricing,
            internet_speed: msg.internet_speed,
            remote_url: msg.remote_url.clone(),
            version: msg.version.clone(),
            category: msg.category,
            status: Status::Active,
            status_at: self.height(),
        };
        self.set_node(&node)?;
        self.set_active_index(&node)?;
        info!(node = %node.address, owner = %owner, "node registered");
        Ok(node)
    }

    pub fn update_node(&mut self, signer: &Address, msg: &MsgUpdateNode) -> Result<Node> {
        let pricing = msg.validate_basic(self.params())?;
        let mut node = self.require_node(&msg.node)?;
        if &node.owner != signer {
            return Err(LedgerError::Unauthorized(format!(
                "{signer} is not the owner of node {}",
                node.address
            )));
        }

        if let Some(pricing) = pricing {
            node.pricing = pricing;
        }
        if !msg.internet_speed.is_all_zero() {
            node.internet_speed = msg.internet_speed;
        }
        if !msg.remote_url.is_empty() {
            node.remote_url = msg.remote_url.clone();
        }
        if !msg.version.is_empty() {
            node.version = msg.version.clone();
        }
        if msg.category.is_valid() {
            node.category = msg.category;
        }
        self.set_node(&node)?;
        Ok(node)
    }

    /// Owner-driven status change. `Active` on an active node is a heartbeat;
    /// a transition to `Inactive` ends every node-based subscription that
    /// depends on the node.
    pub fn set_node_status(
        &mut self,
        signer: &Address,
        msg: &MsgSetNodeStatus,
    ) -> Result<(Node, Vec<EndedSubscription>)> {
        msg.validate_basic()?;
        let node = self.require_node(&msg.node)?;
        if &node.owner != signer {
            return Err(LedgerError::Unauthorized(format!(
                "{signer} is not the owner of node {}",
                node.address
            )));
        }

        match msg.status {
            Status::Active => Ok((self.activate_node(node)?, Vec::new())),
            _ => self.deactivate_node(node),
        }
    }

    fn activate_node(&mut self, mut node: Node) -> Result<Node> {
        if node.is_active() {
            self.clear_active_index(&node)?;
        }
        node.status = Status::Active;
        node.status_at = self.height();
        self.set_node(&node)?;
        self.set_active_index(&node)?;
        Ok(node)
    }

    /// Move a node to `Inactive` and force-end the node-based subscriptions
    /// referencing it, ascending by id.
    pub(crate) fn deactivate_node(
        &mut self,
        mut node: Node,
    ) -> Result<(Node, Vec<EndedSubscription>)> {
        let was_active = node.is_active();
        if was_active {
            self.clear_active_index(&node)?;
        }
        node.status = Status::Inactive;
        node.status_at = self.height();
        self.set_node(&node)?;

        let ended = if was_active {
            info!(node = %node.address, height = self.height(), "node deactivated");
            self.end_subscriptions_for_node(&node.address)?
        } else {
            Vec::new()
        };
        Ok((node, ended))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use bwhub_storage::MemoryStore;
    use bwhub_types::{Coin, Coins};

    fn owner() -> Address {
        Address::new([1u8; 32])
    }

    fn register_msg() -> MsgRegisterNode {
        MsgRegisterNode {
            provider: None,
            price: Some(Coins::from(Coin::new("utok", 10))),
            internet_speed: Bandwidth::new(1_000, 1_000),
            remote_url: "https://n1.example:8585".into(),
            version: "0.3.2".into(),
            category: NodeCategory::WireGuard,
        }
    }

    fn empty_update(node: NodeAddress) -> MsgUpdateNode {
        MsgUpdateNode {
            node,
            provider: None,
            price: None,
            internet_speed: Bandwidth::ZERO,
            remote_url: String::new(),
            version: String::new(),
            category: NodeCategory::Unknown,
        }
    }

    #[test]
    fn registration_assigns_distinct_addresses() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 5);

        let first = ledger.register_node(&owner(), &register_msg()).unwrap();
        let second = ledger.register_node(&owner(), &register_msg()).unwrap();
        assert_ne!(first.address, second.address);
        assert_eq!(first.address, NodeAddress::derive(&owner(), 1));
        assert_eq!(first.status, Status::Active);
        assert_eq!(first.status_at, 5);
    }

    #[test]
    fn update_with_all_zero_fields_changes_nothing() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 5);
        let node = ledger.register_node(&owner(), &register_msg()).unwrap();

        let updated = ledger
            .update_node(&owner(), &empty_update(node.address))
            .unwrap();
        assert_eq!(updated, node);
    }

    #[test]
    fn update_switches_pricing_and_fields() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 5);
        let node = ledger.register_node(&owner(), &register_msg()).unwrap();
        let provider = Address::new([4u8; 32]);

        let msg = MsgUpdateNode {
            provider: Some(provider),
            internet_speed: Bandwidth::new(5, 6),
            version: "0.4.0".into(),
            ..empty_update(node.address)
        };
        let updated = ledger.update_node(&owner(), &msg).unwrap();
        assert_eq!(updated.provider(), Some(&provider));
        assert_eq!(updated.unit_price("utok"), None);
        assert_eq!(updated.internet_speed, Bandwidth::new(5, 6));
        assert_eq!(updated.version, "0.4.0");
        assert_eq!(updated.remote_url, node.remote_url);
    }

    #[test]
    fn only_owner_may_update_or_set_status() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 5);
        let node = ledger.register_node(&owner(), &register_msg()).unwrap();
        let stranger = Address::new([2u8; 32]);

        assert!(matches!(
            ledger.update_node(&stranger, &empty_update(node.address)),
            Err(LedgerError::Unauthorized(_))
        ));
        let status = MsgSetNodeStatus {
            node: node.address,
            status: Status::Inactive,
        };
        assert!(matches!(
            ledger.set_node_status(&stranger, &status),
            Err(LedgerError::Unauthorized(_))
        ));
    }

    #[test]
    fn unknown_node_is_not_found() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 5);
        let status = MsgSetNodeStatus {
            node: NodeAddress::new([7u8; 32]),
            status: Status::Active,
        };
        assert!(matches!(
            ledger.set_node_status(&owner(), &status),
            Err(LedgerError::NotFound { kind: "node", .. })
        ));
    }

    #[test]
    fn heartbeat_moves_the_active_index() {
        let params = Params {
            inactive_duration: 10,
            ..Params::default()
        };
        let mut store = MemoryStore::new();
        let node = Ledger::new(&mut store, &params, 5)
            .register_node(&owner(), &register_msg())
            .unwrap();

        assert_eq!(get_expired_nodes(&store, 15, 10).unwrap(), vec![]);
        assert_eq!(get_expired_nodes(&store, 16, 10).unwrap(), vec![node.address]);

        let heartbeat = MsgSetNodeStatus {
            node: node.address,
            status: Status::Active,
        };
        Ledger::new(&mut store, &params, 12)
            .set_node_status(&owner(), &heartbeat)
            .unwrap();
        assert_eq!(get_expired_nodes(&store, 16, 10).unwrap(), vec![]);
        assert_eq!(store.scan_prefix(&[keys::ACTIVE_NODE_PREFIX]).unwrap().len(), 1);
    }

    #[test]
    fn deactivation_clears_the_active_index() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let node = Ledger::new(&mut store, &params, 5)
            .register_node(&owner(), &register_msg())
            .unwrap();
        let msg = MsgSetNodeStatus {
            node: node.address,
            status: Status::Inactive,
        };
        let (node, ended) = Ledger::new(&mut store, &params, 6)
            .set_node_status(&owner(), &msg)
            .unwrap();
        assert_eq!(node.status, Status::Inactive);
        assert_eq!(node.status_at, 6);
        assert!(ended.is_empty());
        assert!(store.scan_prefix(&[keys::ACTIVE_NODE_PREFIX]).unwrap().is_empty());
    }
}
