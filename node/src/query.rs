//! Read-only state queries printed as JSON.

use anyhow::{anyhow, bail, Context, Result};
use bwhub_ledger::{PageRequest, Querier};
use bwhub_types::{Address, NodeAddress};
use serde_json::Value;

pub const RESOURCES: &[&str] = &[
    "deposit",
    "deposits",
    "node",
    "nodes",
    "nodes-for-provider",
    "plan",
    "plans",
    "plans-for-provider",
    "plan-nodes",
    "subscription",
    "subscriptions",
    "subscriptions-for-address",
    "subscriptions-for-node",
    "quota",
    "quotas",
    "session",
];

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{name}>"))
}

fn id(args: &[String], index: usize) -> Result<u64> {
    arg(args, index, "id")?
        .parse()
        .with_context(|| format!("invalid id '{}'", args[index]))
}

fn address(args: &[String], index: usize) -> Result<Address> {
    Ok(arg(args, index, "address")?.parse()?)
}

fn node(args: &[String], index: usize) -> Result<NodeAddress> {
    Ok(arg(args, index, "node")?.parse()?)
}

/// Run `resource` with positional `args` and return the JSON result.
/// Missing single entries are reported as `null`.
pub fn run(querier: &Querier<'_>, resource: &str, args: &[String], page: PageRequest) -> Result<Value> {
    let value = match resource {
        "deposit" => serde_json::to_value(querier.deposit(&address(args, 0)?)?)?,
        "deposits" => serde_json::to_value(querier.deposits(page)?)?,
        "node" => serde_json::to_value(querier.node(&node(args, 0)?)?)?,
        "nodes" => serde_json::to_value(querier.nodes(page)?)?,
        "nodes-for-provider" => {
            serde_json::to_value(querier.nodes_for_provider(&address(args, 0)?, page)?)?
        }
        "plan" => serde_json::to_value(querier.plan(id(args, 0)?)?)?,
        "plans" => serde_json::to_value(querier.plans(page)?)?,
        "plans-for-provider" => {
            serde_json::to_value(querier.plans_for_provider(&address(args, 0)?, page)?)?
        }
        "plan-nodes" => serde_json::to_value(querier.plan_nodes(id(args, 0)?, page)?)?,
        "subscription" => serde_json::to_value(querier.subscription(id(args, 0)?)?)?,
        "subscriptions" => serde_json::to_value(querier.subscriptions(page)?)?,
        "subscriptions-for-address" => {
            serde_json::to_value(querier.subscriptions_for_address(&address(args, 0)?, page)?)?
        }
        "subscriptions-for-node" => {
            serde_json::to_value(querier.subscriptions_for_node(&node(args, 0)?, page)?)?
        }
        "quota" => serde_json::to_value(querier.quota(id(args, 0)?, &address(args, 1)?)?)?,
        "quotas" => serde_json::to_value(querier.quotas(id(args, 0)?, page)?)?,
        "session" => serde_json::to_value(querier.session(
            id(args, 0)?,
            &node(args, 1)?,
            &address(args, 2)?,
        )?)?,
        other => bail!("unknown resource '{other}'"),
    };
    Ok(value)
}
