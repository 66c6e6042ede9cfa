//! Session accounting: folds node usage reports into quotas and, for
//! node-based subscriptions, draws the cost down from the reserve and pays
//! it to the node operator.

use crate::bank::Bank;
use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use crate::msg::MsgUpdateSession;
use crate::plan::has_plan_node;
use crate::subscription::{EndedSubscription, SubscriptionKind};
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Bandwidth, Coin, Coins, Height, NodeAddress};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Last cumulative usage reported for one consumer through one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subscription_id: u64,
    pub node: NodeAddress,
    pub address: Address,
    pub bandwidth: Bandwidth,
    pub status_at: Height,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReceipt {
    pub session: Session,
    /// Quota consumption after the report.
    pub consumed: Bandwidth,
    /// Charged against the reserve, node-based only.
    pub cost: Option<Coin>,
    /// Set when the report exhausted the reserve.
    pub ended: Option<EndedSubscription>,
}

pub fn get_session(
    store: &dyn KvStore,
    id: u64,
    node: &NodeAddress,
    address: &Address,
) -> Result<Option<Session>> {
    Ok(store.get_json(&keys::session_key(id, node, address))?)
}

impl Ledger<'_> {
    pub fn update_session(
        &mut self,
        bank: &mut dyn Bank,
        signer: &Address,
        msg: &MsgUpdateSession,
    ) -> Result<UsageReceipt> {
        msg.validate_basic()?;
        let mut subscription = self.require_subscription(msg.subscription_id)?;
        subscription.ensure_usable(self.height())?;

        let node = self.require_node(&msg.node)?;
        if &node.owner != signer {
            return Err(LedgerError::Unauthorized(format!(
                "{signer} does not operate node {}",
                node.address
            )));
        }
        let serves = match &subscription.kind {
            SubscriptionKind::Node { node: served, .. } => served == &node.address,
            SubscriptionKind::Plan { plan_id, .. } => {
                has_plan_node(self.store(), *plan_id, &node.address)?
            }
        };
        if !serves {
            return Err(LedgerError::Unauthorized(format!(
                "node {} does not serve subscription {}",
                node.address, subscription.id
            )));
        }

        let mut quota = self.require_quota(subscription.id, &msg.address)?;
        let previous = get_session(self.store(), subscription.id, &node.address, &msg.address)?
            .map(|session| session.bandwidth)
            .unwrap_or(Bandwidth::ZERO);
        let delta = msg.bandwidth.checked_sub(&previous).ok_or_else(|| {
            LedgerError::StaleReport(format!(
                "reported {} is below the recorded {previous}",
                msg.bandwidth
            ))
        })?;

        let consumed = quota
            .consumed
            .checked_add(&delta)
            .filter(|consumed| consumed.is_all_lte(&quota.allocated))
            .ok_or_else(|| {
                LedgerError::QuotaExceeded(format!(
                    "usage {delta} of {} on subscription {} exceeds the remaining {}",
                    msg.address,
                    subscription.id,
                    quota.remaining()
                ))
            })?;

        let mut exhausted = false;
        let cost = match &mut subscription.kind {
            SubscriptionKind::Node {
                unit_price,
                remaining,
                ..
            } => {
                let amount = unit_price
                    .amount
                    .checked_mul(delta.total())
                    .filter(|amount| *amount <= remaining.amount)
                    .ok_or_else(|| {
                        LedgerError::insufficient(
                            format!("{}x{unit_price}", delta.total()),
                            &*remaining,
                        )
                    })?;
                remaining.amount -= amount;
                exhausted = remaining.is_zero();
                Some(Coin::new(unit_price.denom.clone(), amount))
            }
            SubscriptionKind::Plan { .. } => None,
        };

        quota.consumed = consumed;
        self.set_quota(subscription.id, &quota)?;
        let session = Session {
            subscription_id: subscription.id,
            node: node.address,
            address: msg.address,
            bandwidth: msg.bandwidth,
            status_at: self.height(),
        };
        self.store_mut().set_json(
            &keys::session_key(subscription.id, &node.address, &msg.address),
            &session,
        )?;
        debug!(
            subscription = subscription.id,
            node = %node.address,
            address = %msg.address,
            delta = %delta,
            consumed = %consumed,
            "usage recorded"
        );

        let ended = if exhausted {
            Some(self.close_subscription(subscription)?)
        } else {
            if cost.is_some() {
                self.set_subscription(&subscription)?;
            }
            None
        };

        if let Some(cost) = cost.as_ref().filter(|cost| !cost.is_zero()) {
            bank.credit(&node.owner, &Coins::from(cost.clone()))?;
        }
        Ok(UsageReceipt {
            session,
            consumed,
            cost,
            ended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;
    use crate::msg::{MsgRegisterNode, MsgStartSubscription};
    use crate::params::Params;
    use bwhub_storage::MemoryStore;
    use bwhub_types::{NodeCategory, Status};

    fn operator() -> Address {
        Address::new([2u8; 32])
    }

    fn consumer() -> Address {
        Address::new([1u8; 32])
    }

    /// Node priced at 10utok per byte with a 1000utok subscription on it.
    fn setup(store: &mut MemoryStore, params: &Params) -> (NodeAddress, u64) {
        let mut bank = InMemoryBank::new();
        let mut ledger = Ledger::new(store, params, 1);
        let node = ledger
            .register_node(
                &operator(),
                &MsgRegisterNode {
                    provider: None,
                    price: Some(Coins::from(Coin::new("utok", 10))),
                    internet_speed: Bandwidth::new(10, 10),
                    remote_url: "https://n.example".into(),
                    version: "1".into(),
                    category: NodeCategory::WireGuard,
                },
            )
            .unwrap()
            .address;
        ledger
            .add_deposit(&consumer(), &Coins::from(Coin::new("utok", 1_000)))
            .unwrap();
        let sub = ledger
            .start_subscription(
                &mut bank,
                &consumer(),
                &MsgStartSubscription::for_node(node, Coin::new("utok", 1_000)),
            )
            .unwrap();
        (node, sub.id)
    }

    fn report(id: u64, node: NodeAddress, up: u64, down: u64) -> MsgUpdateSession {
        MsgUpdateSession {
            subscription_id: id,
            node,
            address: consumer(),
            bandwidth: Bandwidth::new(up, down),
        }
    }

    #[test]
    fn cumulative_reports_charge_the_delta() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let (node, id) = setup(&mut store, &params);
        let mut bank = InMemoryBank::new();
        let mut ledger = Ledger::new(&mut store, &params, 2);

        let first = ledger.update_session(&mut bank, &operator(), &report(id, node, 10, 5)).unwrap();
        assert_eq!(first.cost, Some(Coin::new("utok", 150)));
        let second = ledger.update_session(&mut bank, &operator(), &report(id, node, 12, 5)).unwrap();
        assert_eq!(second.cost, Some(Coin::new("utok", 20)));
        assert_eq!(second.consumed, Bandwidth::new(12, 5));
        assert!(second.ended.is_none());
        assert_eq!(bank.balance(&operator()), Coins::from(Coin::new("utok", 170)));

        assert!(matches!(
            ledger.update_session(&mut bank, &operator(), &report(id, node, 11, 6)),
            Err(LedgerError::StaleReport(_))
        ));
        match &ledger.subscription(id).unwrap().unwrap().kind {
            SubscriptionKind::Node { remaining, .. } => assert_eq!(remaining.amount, 830),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn exhausting_the_reserve_ends_the_subscription() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let (node, id) = setup(&mut store, &params);
        let mut bank = InMemoryBank::new();
        let mut ledger = Ledger::new(&mut store, &params, 2);

        let receipt = ledger.update_session(&mut bank, &operator(), &report(id, node, 50, 50)).unwrap();
        assert_eq!(receipt.cost, Some(Coin::new("utok", 1_000)));
        let ended = receipt.ended.unwrap();
        assert_eq!(ended.refund, Some(Coin::new("utok", 0)));
        assert_eq!(ledger.subscription(id).unwrap().unwrap().status, Status::Inactive);
        assert!(matches!(
            ledger.update_session(&mut bank, &operator(), &report(id, node, 51, 50)),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn cost_above_the_reserve_is_rejected() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let (node, id) = setup(&mut store, &params);
        let mut bank = InMemoryBank::new();
        let mut ledger = Ledger::new(&mut store, &params, 2);
        assert!(matches!(
            ledger.update_session(&mut bank, &operator(), &report(id, node, 100, 1)),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        match ledger.update_session(&mut bank, &operator(), &report(id, node, 101, 0)) {
            Err(LedgerError::QuotaExceeded(reason)) => {
                assert!(reason.contains("remaining 100up/100down"), "{reason}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn only_the_serving_operator_may_report() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let (node, id) = setup(&mut store, &params);
        let mut bank = InMemoryBank::new();
        let mut ledger = Ledger::new(&mut store, &params, 2);
        assert!(matches!(
            ledger.update_session(&mut bank, &consumer(), &report(id, node, 1, 1)),
            Err(LedgerError::Unauthorized(_))
        ));

        let other = MsgUpdateSession {
            address: Address::new([7u8; 32]),
            ..report(id, node, 1, 1)
        };
        assert!(matches!(
            ledger.update_session(&mut bank, &operator(), &other),
            Err(LedgerError::NotFound { kind: "quota", .. })
        ));
    }
}
