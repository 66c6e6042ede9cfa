use serde::{Deserialize, Serialize};
use std::fmt;

/// Block height.
pub type Height = u64;

/// Lifecycle status shared by nodes, plans and subscriptions.
///
/// `Unspecified` only ever appears on the wire; stored entities are always
/// `Active` or `Inactive`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unspecified,
    Active,
    Inactive,
}

impl Status {
    pub fn is_valid(&self) -> bool {
        matches!(self, Status::Active | Status::Inactive)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Status::Unspecified => "unspecified",
            Status::Active => "active",
            Status::Inactive => "inactive",
        };
        f.write_str(value)
    }
}

/// Tunnel technology advertised by a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    #[default]
    Unknown,
    OpenVpn,
    WireGuard,
}

impl NodeCategory {
    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeCategory::Unknown)
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NodeCategory::Unknown => "unknown",
            NodeCategory::OpenVpn => "openvpn",
            NodeCategory::WireGuard => "wireguard",
        };
        f.write_str(value)
    }
}
