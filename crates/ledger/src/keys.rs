//! Store key layout.
//!
//! One-byte table prefixes followed by fixed-width big-endian ids and raw
//! 32-byte addresses, so ascending key order equals ascending id/address order.

use bwhub_types::{Address, Height, NodeAddress, ADDRESS_BYTES};

pub const LAST_HEIGHT_KEY: &[u8] = &[0x00, 0x01];

pub const DEPOSIT_PREFIX: u8 = 0x10;

pub const NODE_PREFIX: u8 = 0x20;
pub const NODE_COUNT_KEY: &[u8] = &[0x21];
pub const ACTIVE_NODE_PREFIX: u8 = 0x22;

pub const PLAN_PREFIX: u8 = 0x30;
pub const PLAN_COUNT_KEY: &[u8] = &[0x31];
pub const PLAN_NODE_PREFIX: u8 = 0x32;

pub const SUBSCRIPTION_PREFIX: u8 = 0x40;
pub const SUBSCRIPTION_COUNT_KEY: &[u8] = &[0x41];
pub const SUBSCRIPTION_FOR_NODE_PREFIX: u8 = 0x42;
pub const SUBSCRIPTION_FOR_ADDRESS_PREFIX: u8 = 0x43;

pub const QUOTA_PREFIX: u8 = 0x50;

pub const SESSION_PREFIX: u8 = 0x60;

fn key(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.push(prefix);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

pub fn deposit_key(address: &Address) -> Vec<u8> {
    key(DEPOSIT_PREFIX, &[address.as_bytes()])
}

pub fn node_key(address: &NodeAddress) -> Vec<u8> {
    key(NODE_PREFIX, &[address.as_bytes()])
}

pub fn active_node_key(status_at: Height, address: &NodeAddress) -> Vec<u8> {
    key(
        ACTIVE_NODE_PREFIX,
        &[&status_at.to_be_bytes(), address.as_bytes()],
    )
}

pub fn plan_key(id: u64) -> Vec<u8> {
    key(PLAN_PREFIX, &[&id.to_be_bytes()])
}

pub fn plan_node_prefix(id: u64) -> Vec<u8> {
    key(PLAN_NODE_PREFIX, &[&id.to_be_bytes()])
}

pub fn plan_node_key(id: u64, node: &NodeAddress) -> Vec<u8> {
    key(PLAN_NODE_PREFIX, &[&id.to_be_bytes(), node.as_bytes()])
}

pub fn subscription_key(id: u64) -> Vec<u8> {
    key(SUBSCRIPTION_PREFIX, &[&id.to_be_bytes()])
}

pub fn subscription_for_node_prefix(node: &NodeAddress) -> Vec<u8> {
    key(SUBSCRIPTION_FOR_NODE_PREFIX, &[node.as_bytes()])
}

pub fn subscription_for_node_key(node: &NodeAddress, id: u64) -> Vec<u8> {
    key(
        SUBSCRIPTION_FOR_NODE_PREFIX,
        &[node.as_bytes(), &id.to_be_bytes()],
    )
}

pub fn subscription_for_address_prefix(address: &Address) -> Vec<u8> {
    key(SUBSCRIPTION_FOR_ADDRESS_PREFIX, &[address.as_bytes()])
}

pub fn subscription_for_address_key(address: &Address, id: u64) -> Vec<u8> {
    key(
        SUBSCRIPTION_FOR_ADDRESS_PREFIX,
        &[address.as_bytes(), &id.to_be_bytes()],
    )
}

pub fn quota_prefix(id: u64) -> Vec<u8> {
    key(QUOTA_PREFIX, &[&id.to_be_bytes()])
}

pub fn quota_key(id: u64, address: &Address) -> Vec<u8> {
    key(QUOTA_PREFIX, &[&id.to_be_bytes(), address.as_bytes()])
}

pub fn session_key(id: u64, node: &NodeAddress, address: &Address) -> Vec<u8> {
    key(
        SESSION_PREFIX,
        &[&id.to_be_bytes(), node.as_bytes(), address.as_bytes()],
    )
}

/// Trailing 32-byte node address of an index key.
pub fn node_from_key_suffix(key: &[u8]) -> Option<NodeAddress> {
    let start = key.len().checked_sub(ADDRESS_BYTES)?;
    let bytes: [u8; ADDRESS_BYTES] = key[start..].try_into().ok()?;
    Some(NodeAddress::new(bytes))
}

/// Trailing big-endian id of an index key.
pub fn id_from_key_suffix(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Height embedded in an active-node index key.
pub fn height_from_active_node_key(key: &[u8]) -> Option<Height> {
    let bytes: [u8; 8] = key.get(1..9)?.try_into().ok()?;
    Some(Height::from_be_bytes(bytes))
}
