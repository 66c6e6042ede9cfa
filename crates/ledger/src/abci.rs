//! Block-boundary hook: the inactivity sweep.

use crate::errors::Result;
use crate::ledger::Ledger;
use crate::node::get_expired_nodes;
use crate::params::Params;
use crate::subscription::EndedSubscription;
use bwhub_storage::{CacheStore, KvStore};
use bwhub_types::{Height, NodeAddress};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deactivated: Vec<NodeAddress>,
    pub ended: Vec<EndedSubscription>,
    /// Nodes whose cascade failed and was rolled back, with the reason.
    pub failed: Vec<(NodeAddress, String)>,
}

/// Deactivate every node whose heartbeat fell out of the liveness window and
/// force-end its node-based subscriptions. Nodes are visited in ascending
/// address order; each cascade runs in its own cache so one failure is
/// logged and rolled back without touching the others.
pub fn begin_block(store: &mut dyn KvStore, params: &Params, height: Height) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for address in get_expired_nodes(store, height, params.inactive_duration)? {
        let mut cache = CacheStore::new(&mut *store);
        let outcome = {
            let mut ledger = Ledger::new(&mut cache, params, height);
            ledger
                .require_node(&address)
                .and_then(|node| ledger.deactivate_node(node))
        };
        match outcome.and_then(|result| cache.write().map(|()| result).map_err(Into::into)) {
            Ok((_, ended)) => {
                debug!(node = %address, ended = ended.len(), "node swept");
                report.deactivated.push(address);
                report.ended.extend(ended);
            }
            Err(err) => {
                warn!(node = %address, height, error = %err, "inactivity cascade failed");
                report.failed.push((address, err.to_string()));
            }
        }
    }
    Ok(report)
}
