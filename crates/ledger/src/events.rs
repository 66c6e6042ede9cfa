use bwhub_types::{Address, Bandwidth, Coin, Coins, NodeAddress, Status};
use serde::{Deserialize, Serialize};

/// State changes reported back to the caller of a successful message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NodeRegistered {
        node: NodeAddress,
        owner: Address,
    },
    NodeUpdated {
        node: NodeAddress,
    },
    NodeStatusChanged {
        node: NodeAddress,
        status: Status,
    },
    PlanAdded {
        id: u64,
        provider: Address,
    },
    PlanStatusChanged {
        id: u64,
        status: Status,
    },
    PlanNodeAdded {
        id: u64,
        node: NodeAddress,
    },
    PlanNodeRemoved {
        id: u64,
        node: NodeAddress,
    },
    SubscriptionStarted {
        id: u64,
        owner: Address,
    },
    QuotaAdded {
        id: u64,
        address: Address,
        allocated: Bandwidth,
    },
    QuotaUpdated {
        id: u64,
        address: Address,
        allocated: Bandwidth,
    },
    SubscriptionEnded {
        id: u64,
        refund: Option<Coin>,
    },
    SessionUpdated {
        subscription_id: u64,
        node: NodeAddress,
        address: Address,
        consumed: Bandwidth,
        cost: Option<Coin>,
    },
    DepositAdded {
        address: Address,
        coins: Coins,
    },
    DepositWithdrawn {
        address: Address,
        coins: Coins,
    },
}
