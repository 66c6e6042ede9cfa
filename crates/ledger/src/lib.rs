//! Accounting engine of the bandwidth marketplace.
//!
//! Nodes, plans, deposits, subscriptions, quotas and sessions live in one
//! ordered key/value store. [`App`] runs each message inside a
//! [`bwhub_storage::CacheStore`] so a message either commits every write or
//! none, and runs the inactivity sweep at every block boundary.

pub mod abci;
pub mod app;
pub mod bank;
pub mod deposit;
pub mod errors;
pub mod events;
pub mod handler;
pub mod keys;
pub mod ledger;
pub mod msg;
pub mod node;
pub mod params;
pub mod plan;
pub mod query;
pub mod quota;
pub mod session;
pub mod subscription;

pub use abci::SweepReport;
pub use app::App;
pub use bank::{Bank, BankCall, CacheBank, InMemoryBank};
pub use deposit::Deposit;
pub use errors::{LedgerError, Result};
pub use events::Event;
pub use ledger::Ledger;
pub use msg::*;
pub use node::Node;
pub use params::Params;
pub use plan::Plan;
pub use query::{Page, PageRequest, Querier};
pub use quota::Quota;
pub use session::{Session, UsageReceipt};
pub use subscription::{EndedSubscription, Subscription, SubscriptionKind};
