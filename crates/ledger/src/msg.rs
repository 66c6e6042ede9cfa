//! Inbound messages.
//!
//! Signature and envelope checks happen before a message reaches the engine;
//! the signer arrives alongside the message. `validate_basic` performs the
//! stateless field checks and runs before any state is read.

use crate::errors::{LedgerError, Result};
use crate::params::Params;
use bwhub_types::{Address, Bandwidth, Coin, Coins, NodeAddress, NodeCategory, Status};
use serde::{Deserialize, Serialize};

/// A node is either priced by its own operator or sold through a provider's
/// plans, never both and never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pricing {
    Provider(Address),
    Price(Coins),
}

impl Pricing {
    /// Build from the optional wire fields, enforcing exclusivity.
    pub fn from_parts(provider: Option<Address>, price: Option<Coins>) -> Result<Self> {
        match (provider, price) {
            (Some(provider), None) => {
                if provider.is_empty() {
                    return Err(LedgerError::InvalidField("provider"));
                }
                Ok(Pricing::Provider(provider))
            }
            (None, Some(price)) => {
                if !price.is_valid() {
                    return Err(LedgerError::InvalidField("price"));
                }
                Ok(Pricing::Price(price))
            }
            _ => Err(LedgerError::InvalidField("provider and price")),
        }
    }
}

fn validate_text(value: &str, field: &'static str, max: usize, required: bool) -> Result<()> {
    if (required && value.is_empty()) || value.chars().count() > max {
        return Err(LedgerError::InvalidField(field));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Coins>,
    pub internet_speed: Bandwidth,
    pub remote_url: String,
    pub version: String,
    pub category: NodeCategory,
}

impl MsgRegisterNode {
    pub fn validate_basic(&self, params: &Params) -> Result<Pricing> {
        let pricing = Pricing::from_parts(self.provider, self.price.clone())?;
        if !self.internet_speed.is_all_positive() {
            return Err(LedgerError::InvalidField("internet_speed"));
        }
        validate_text(&self.remote_url, "remote_url", params.max_field_length, true)?;
        validate_text(&self.version, "version", params.max_field_length, true)?;
        if !self.category.is_valid() {
            return Err(LedgerError::InvalidField("category"));
        }
        Ok(pricing)
    }
}

/// Every field is optional: `None`, empty strings, `(0, 0)` speed and
/// `Unknown` category all mean "leave unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateNode {
    pub node: NodeAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Coins>,
    #[serde(default)]
    pub internet_speed: Bandwidth,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: NodeCategory,
}

impl MsgUpdateNode {
    /// Returns the replacement pricing, if any.
    pub fn validate_basic(&self, params: &Params) -> Result<Option<Pricing>> {
        let pricing = match (&self.provider, &self.price) {
            (None, None) => None,
            _ => Some(Pricing::from_parts(self.provider, self.price.clone())?),
        };
        if !self.internet_speed.is_all_zero() && !self.internet_speed.is_all_positive() {
            return Err(LedgerError::InvalidField("internet_speed"));
        }
        validate_text(&self.remote_url, "remote_url", params.max_field_length, false)?;
        validate_text(&self.version, "version", params.max_field_length, false)?;
        Ok(pricing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetNodeStatus {
    pub node: NodeAddress,
    pub status: Status,
}

impl MsgSetNodeStatus {
    pub fn validate_basic(&self) -> Result<()> {
        if !self.status.is_valid() {
            return Err(LedgerError::InvalidField("status"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddPlan {
    pub price: Coins,
    /// Lifetime of subscriptions in blocks; zero means no time bound.
    #[serde(default)]
    pub validity: u64,
    pub bandwidth: Bandwidth,
}

impl MsgAddPlan {
    pub fn validate_basic(&self) -> Result<()> {
        if !self.price.is_valid() {
            return Err(LedgerError::InvalidField("price"));
        }
        if !self.bandwidth.is_all_positive() {
            return Err(LedgerError::InvalidField("bandwidth"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetPlanStatus {
    pub id: u64,
    pub status: Status,
}

impl MsgSetPlanStatus {
    pub fn validate_basic(&self) -> Result<()> {
        if self.id == 0 {
            return Err(LedgerError::InvalidField("id"));
        }
        if !self.status.is_valid() {
            return Err(LedgerError::InvalidField("status"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddNodeForPlan {
    pub id: u64,
    pub node: NodeAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveNodeForPlan {
    pub id: u64,
    pub node: NodeAddress,
}

fn validate_plan_id(id: u64) -> Result<()> {
    if id == 0 {
        return Err(LedgerError::InvalidField("id"));
    }
    Ok(())
}

impl MsgAddNodeForPlan {
    pub fn validate_basic(&self) -> Result<()> {
        validate_plan_id(self.id)
    }
}

impl MsgRemoveNodeForPlan {
    pub fn validate_basic(&self) -> Result<()> {
        validate_plan_id(self.id)
    }
}

/// What a subscription is bought against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionTarget {
    Plan { id: u64, denom: String },
    Node { address: NodeAddress, deposit: Coin },
}

/// Exactly one of `plan_id` (with `denom`) or `node` (with `deposit`) is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MsgStartSubscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<Coin>,
}

impl MsgStartSubscription {
    pub fn for_plan(id: u64, denom: impl Into<String>) -> Self {
        Self {
            plan_id: Some(id),
            denom: Some(denom.into()),
            ..Self::default()
        }
    }

    pub fn for_node(address: NodeAddress, deposit: Coin) -> Self {
        Self {
            node: Some(address),
            deposit: Some(deposit),
            ..Self::default()
        }
    }

    pub fn validate_basic(&self) -> Result<SubscriptionTarget> {
        match (&self.plan_id, &self.node) {
            (Some(id), None) => {
                if self.deposit.is_some() {
                    return Err(LedgerError::InvalidField("deposit"));
                }
                validate_plan_id(*id)?;
                let denom = self
                    .denom
                    .as_ref()
                    .filter(|d| bwhub_types::is_valid_denom(d))
                    .ok_or(LedgerError::InvalidField("denom"))?;
                Ok(SubscriptionTarget::Plan {
                    id: *id,
                    denom: denom.clone(),
                })
            }
            (None, Some(address)) => {
                if self.denom.is_some() {
                    return Err(LedgerError::InvalidField("denom"));
                }
                let deposit = self
                    .deposit
                    .as_ref()
                    .filter(|d| d.is_valid())
                    .ok_or(LedgerError::InvalidField("deposit"))?;
                Ok(SubscriptionTarget::Node {
                    address: *address,
                    deposit: deposit.clone(),
                })
            }
            _ => Err(LedgerError::InvalidField("plan_id and node")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddQuotaForSubscription {
    pub id: u64,
    pub address: Address,
    pub bandwidth: Bandwidth,
}

impl MsgAddQuotaForSubscription {
    pub fn validate_basic(&self) -> Result<()> {
        if self.id == 0 {
            return Err(LedgerError::InvalidField("id"));
        }
        if self.address.is_empty() {
            return Err(LedgerError::InvalidField("address"));
        }
        if self.bandwidth.is_all_zero() {
            return Err(LedgerError::InvalidField("bandwidth"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateQuotaForSubscription {
    pub id: u64,
    pub address: Address,
    pub bandwidth: Bandwidth,
}

impl MsgUpdateQuotaForSubscription {
    pub fn validate_basic(&self) -> Result<()> {
        if self.id == 0 {
            return Err(LedgerError::InvalidField("id"));
        }
        if self.address.is_empty() {
            return Err(LedgerError::InvalidField("address"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEndSubscription {
    pub id: u64,
}

impl MsgEndSubscription {
    pub fn validate_basic(&self) -> Result<()> {
        if self.id == 0 {
            return Err(LedgerError::InvalidField("id"));
        }
        Ok(())
    }
}

/// Usage report from a node. `bandwidth` is the cumulative total of the
/// session identified by (subscription, node, consumer address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateSession {
    pub subscription_id: u64,
    pub node: NodeAddress,
    pub address: Address,
    pub bandwidth: Bandwidth,
}

impl MsgUpdateSession {
    pub fn validate_basic(&self) -> Result<()> {
        if self.subscription_id == 0 {
            return Err(LedgerError::InvalidField("subscription_id"));
        }
        if self.address.is_empty() {
            return Err(LedgerError::InvalidField("address"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgFundDeposit {
    pub coins: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdrawDeposit {
    pub coins: Coins,
}

impl MsgFundDeposit {
    pub fn validate_basic(&self) -> Result<()> {
        if !self.coins.is_valid() {
            return Err(LedgerError::InvalidField("coins"));
        }
        Ok(())
    }
}

impl MsgWithdrawDeposit {
    pub fn validate_basic(&self) -> Result<()> {
        if !self.coins.is_valid() {
            return Err(LedgerError::InvalidField("coins"));
        }
        Ok(())
    }
}

/// Every message the engine accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Msg {
    RegisterNode(MsgRegisterNode),
    UpdateNode(MsgUpdateNode),
    SetNodeStatus(MsgSetNodeStatus),
    AddPlan(MsgAddPlan),
    SetPlanStatus(MsgSetPlanStatus),
    AddNodeForPlan(MsgAddNodeForPlan),
    RemoveNodeForPlan(MsgRemoveNodeForPlan),
    StartSubscription(MsgStartSubscription),
    AddQuotaForSubscription(MsgAddQuotaForSubscription),
    UpdateQuotaForSubscription(MsgUpdateQuotaForSubscription),
    EndSubscription(MsgEndSubscription),
    UpdateSession(MsgUpdateSession),
    FundDeposit(MsgFundDeposit),
    WithdrawDeposit(MsgWithdrawDeposit),
}

impl Msg {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::RegisterNode(_) => "register_node",
            Msg::UpdateNode(_) => "update_node",
            Msg::SetNodeStatus(_) => "set_node_status",
            Msg::AddPlan(_) => "add_plan",
            Msg::SetPlanStatus(_) => "set_plan_status",
            Msg::AddNodeForPlan(_) => "add_node_for_plan",
            Msg::RemoveNodeForPlan(_) => "remove_node_for_plan",
            Msg::StartSubscription(_) => "start_subscription",
            Msg::AddQuotaForSubscription(_) => "add_quota_for_subscription",
            Msg::UpdateQuotaForSubscription(_) => "update_quota_for_subscription",
            Msg::EndSubscription(_) => "end_subscription",
            Msg::UpdateSession(_) => "update_session",
            Msg::FundDeposit(_) => "fund_deposit",
            Msg::WithdrawDeposit(_) => "withdraw_deposit",
        }
    }
}
