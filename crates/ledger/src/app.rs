//! Application wrapper: owns committed state and drives blocks.

use crate::abci::{self, SweepReport};
use crate::bank::{Bank, CacheBank};
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::handler;
use crate::keys::LAST_HEIGHT_KEY;
use crate::ledger::Ledger;
use crate::msg::Msg;
use crate::params::Params;
use crate::query::Querier;
use bwhub_storage::{CacheStore, KvStore, KvStoreExt};
use bwhub_types::{Address, Height};
use tracing::{debug, error, info, warn};

pub struct App<S: KvStore, B: Bank> {
    store: S,
    bank: B,
    params: Params,
    height: Height,
}

impl<S: KvStore, B: Bank> App<S, B> {
    /// Open an application over `store`, resuming from the last committed
    /// height if the store has one.
    pub fn new(store: S, bank: B, params: Params) -> Result<Self> {
        params.validate()?;
        let height = store.get_u64(LAST_HEIGHT_KEY)?.unwrap_or(0);
        if height > 0 {
            info!(height, "resuming from stored height");
        }
        Ok(Self {
            store,
            bank,
            params,
            height,
        })
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn querier(&self) -> Querier<'_> {
        Querier::new(&self.store)
    }

    /// Start block `height` and run the inactivity sweep. The sweep and the
    /// new height commit together.
    pub fn begin_block(&mut self, height: Height) -> Result<SweepReport> {
        if height <= self.height {
            return Err(LedgerError::InvalidState(format!(
                "block height {height} does not follow {}",
                self.height
            )));
        }

        let mut cache = CacheStore::new(&mut self.store);
        let report = abci::begin_block(&mut cache, &self.params, height)?;
        cache.set_u64(LAST_HEIGHT_KEY, height)?;
        cache.write()?;
        self.height = height;

        if !report.deactivated.is_empty() || !report.failed.is_empty() {
            info!(
                height,
                deactivated = report.deactivated.len(),
                ended = report.ended.len(),
                failed = report.failed.len(),
                "inactivity sweep"
            );
        }
        Ok(report)
    }

    /// Execute one message at the current height. Store writes and bank calls
    /// are buffered while the message runs; on error both are dropped, on
    /// success the store commits first and the bank journal is applied after.
    pub fn deliver(&mut self, signer: &Address, msg: &Msg) -> Result<Vec<Event>> {
        if self.height == 0 {
            return Err(LedgerError::InvalidState("no block in progress".into()));
        }

        let mut cache = CacheStore::new(&mut self.store);
        let mut bank = CacheBank::new(&self.bank);
        let outcome = {
            let mut ledger = Ledger::new(&mut cache, &self.params, self.height);
            handler::handle(&mut ledger, &mut bank, signer, msg)
        };
        let events = match outcome {
            Ok(events) => events,
            Err(err) => {
                warn!(kind = msg.kind(), signer = %signer, code = err.code(), error = %err, "message rejected");
                return Err(err);
            }
        };

        let writes = cache.pending_writes();
        let transfers = bank.into_calls();
        cache.write()?;
        // Every call was already checked against the overlay, so only a
        // failing bank backend can reject one here.
        for call in &transfers {
            if let Err(err) = call.apply(&mut self.bank) {
                error!(kind = msg.kind(), ?call, error = %err, "bank rejected a committed transfer");
                return Err(err);
            }
        }
        debug!(
            kind = msg.kind(),
            signer = %signer,
            writes,
            transfers = transfers.len(),
            "message accepted"
        );
        Ok(events)
    }
}
