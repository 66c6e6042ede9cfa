//! Message dispatch.

use crate::bank::Bank;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::ledger::Ledger;
use crate::msg::{Msg, MsgFundDeposit, MsgWithdrawDeposit};
use crate::subscription::EndedSubscription;
use bwhub_types::Address;

fn ended_event(ended: EndedSubscription) -> Event {
    Event::SubscriptionEnded {
        id: ended.id,
        refund: ended.refund,
    }
}

/// Run one message against `ledger`. The caller owns the transaction: on
/// `Err` it must discard everything written through `ledger`.
pub fn handle(
    ledger: &mut Ledger<'_>,
    bank: &mut dyn Bank,
    signer: &Address,
    msg: &Msg,
) -> Result<Vec<Event>> {
    let events = match msg {
        Msg::RegisterNode(msg) => {
            let node = ledger.register_node(signer, msg)?;
            vec![Event::NodeRegistered {
                node: node.address,
                owner: node.owner,
            }]
        }
        Msg::UpdateNode(msg) => {
            let node = ledger.update_node(signer, msg)?;
            vec![Event::NodeUpdated { node: node.address }]
        }
        Msg::SetNodeStatus(msg) => {
            let (node, ended) = ledger.set_node_status(signer, msg)?;
            let mut events = vec![Event::NodeStatusChanged {
                node: node.address,
                status: node.status,
            }];
            events.extend(ended.into_iter().map(ended_event));
            events
        }
        Msg::AddPlan(msg) => {
            let plan = ledger.add_plan(signer, msg)?;
            vec![Event::PlanAdded {
                id: plan.id,
                provider: plan.provider,
            }]
        }
        Msg::SetPlanStatus(msg) => {
            let plan = ledger.set_plan_status(signer, msg)?;
            vec![Event::PlanStatusChanged {
                id: plan.id,
                status: plan.status,
            }]
        }
        Msg::AddNodeForPlan(msg) => {
            if ledger.add_node_for_plan(signer, msg)? {
                vec![Event::PlanNodeAdded {
                    id: msg.id,
                    node: msg.node,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::RemoveNodeForPlan(msg) => {
            ledger.remove_node_for_plan(signer, msg)?;
            vec![Event::PlanNodeRemoved {
                id: msg.id,
                node: msg.node,
            }]
        }
        Msg::StartSubscription(msg) => {
            let subscription = ledger.start_subscription(bank, signer, msg)?;
            vec![Event::SubscriptionStarted {
                id: subscription.id,
                owner: subscription.owner,
            }]
        }
        Msg::AddQuotaForSubscription(msg) => {
            let quota = ledger.add_quota(signer, msg)?;
            vec![Event::QuotaAdded {
                id: msg.id,
                address: quota.address,
                allocated: quota.allocated,
            }]
        }
        Msg::UpdateQuotaForSubscription(msg) => {
            let quota = ledger.update_quota(signer, msg)?;
            vec![Event::QuotaUpdated {
                id: msg.id,
                address: quota.address,
                allocated: quota.allocated,
            }]
        }
        Msg::EndSubscription(msg) => ledger
            .end_subscription(signer, msg)?
            .map(ended_event)
            .into_iter()
            .collect(),
        Msg::UpdateSession(msg) => {
            let receipt = ledger.update_session(bank, signer, msg)?;
            let mut events = vec![Event::SessionUpdated {
                subscription_id: receipt.session.subscription_id,
                node: receipt.session.node,
                address: receipt.session.address,
                consumed: receipt.consumed,
                cost: receipt.cost,
            }];
            events.extend(receipt.ended.map(ended_event));
            events
        }
        Msg::FundDeposit(msg) => fund_deposit(ledger, bank, signer, msg)?,
        Msg::WithdrawDeposit(msg) => withdraw_deposit(ledger, bank, signer, msg)?,
    };
    Ok(events)
}

fn fund_deposit(
    ledger: &mut Ledger<'_>,
    bank: &mut dyn Bank,
    signer: &Address,
    msg: &MsgFundDeposit,
) -> Result<Vec<Event>> {
    msg.validate_basic()?;
    let balance = bank.balance(signer);
    if !balance.is_all_gte(&msg.coins) {
        return Err(LedgerError::insufficient(&msg.coins, &balance));
    }
    ledger.add_deposit(signer, &msg.coins)?;
    bank.debit(signer, &msg.coins)?;
    Ok(vec![Event::DepositAdded {
        address: *signer,
        coins: msg.coins.clone(),
    }])
}

fn withdraw_deposit(
    ledger: &mut Ledger<'_>,
    bank: &mut dyn Bank,
    signer: &Address,
    msg: &MsgWithdrawDeposit,
) -> Result<Vec<Event>> {
    msg.validate_basic()?;
    ledger.subtract_deposit(signer, &msg.coins)?;
    bank.credit(signer, &msg.coins)?;
    Ok(vec![Event::DepositWithdrawn {
        address: *signer,
        coins: msg.coins.clone(),
    }])
}
