//! Deposit ledger: per-address escrow funding node-based subscriptions.

use crate::errors::{LedgerError, Result};
use crate::keys;
use crate::ledger::Ledger;
use bwhub_storage::{KvStore, KvStoreExt};
use bwhub_types::{Address, Coins};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub address: Address,
    pub coins: Coins,
}

pub fn get_deposit(store: &dyn KvStore, address: &Address) -> Result<Option<Deposit>> {
    Ok(store.get_json(&keys::deposit_key(address))?)
}

/// All deposits, ascending by address.
pub fn get_deposits(store: &dyn KvStore) -> Result<Vec<Deposit>> {
    Ok(store.scan_json(&[keys::DEPOSIT_PREFIX])?)
}

impl Ledger<'_> {
    pub fn deposit(&self, address: &Address) -> Result<Option<Deposit>> {
        get_deposit(self.store(), address)
    }

    fn set_deposit(&mut self, deposit: &Deposit) -> Result<()> {
        self.store_mut()
            .set_json(&keys::deposit_key(&deposit.address), deposit)?;
        Ok(())
    }

    /// Increase the escrow balance of `address`. The matching external debit
    /// is the caller's responsibility.
    pub fn add_deposit(&mut self, address: &Address, coins: &Coins) -> Result<Deposit> {
        let mut deposit = self.deposit(address)?.unwrap_or(Deposit {
            address: *address,
            coins: Coins::new(),
        });
        deposit.coins = deposit
            .coins
            .checked_add(coins)
            .map_err(|_| LedgerError::InvalidField("coins"))?;
        self.set_deposit(&deposit)?;
        debug!(address = %address, added = %coins, balance = %deposit.coins, "deposit added");
        Ok(deposit)
    }

    /// Decrease the escrow balance of `address`, failing if any denomination
    /// would go negative. Returns the new balance.
    pub fn subtract_deposit(&mut self, address: &Address, coins: &Coins) -> Result<Deposit> {
        let mut deposit = self.deposit(address)?.unwrap_or(Deposit {
            address: *address,
            coins: Coins::new(),
        });
        deposit.coins = deposit
            .coins
            .checked_sub(coins)
            .ok_or_else(|| LedgerError::insufficient(coins, &deposit.coins))?;
        self.set_deposit(&deposit)?;
        debug!(address = %address, subtracted = %coins, balance = %deposit.coins, "deposit subtracted");
        Ok(deposit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use bwhub_storage::MemoryStore;
    use bwhub_types::Coin;

    fn utok(amount: u128) -> Coins {
        Coins::from(Coin::new("utok", amount))
    }

    #[test]
    fn add_then_subtract() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 1);
        let owner = Address::new([1u8; 32]);

        assert_eq!(ledger.add_deposit(&owner, &utok(100)).unwrap().coins, utok(100));
        assert_eq!(ledger.add_deposit(&owner, &utok(50)).unwrap().coins, utok(150));
        assert_eq!(
            ledger.subtract_deposit(&owner, &utok(150)).unwrap().coins,
            Coins::new()
        );
        // The record survives at zero.
        assert!(ledger.deposit(&owner).unwrap().is_some());
    }

    #[test]
    fn subtract_beyond_balance_fails_without_writing() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 1);
        let owner = Address::new([1u8; 32]);
        ledger.add_deposit(&owner, &utok(10)).unwrap();

        let err = ledger.subtract_deposit(&owner, &utok(11)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let other_denom = Coins::from(Coin::new("uatom", 1));
        assert!(ledger.subtract_deposit(&owner, &other_denom).is_err());
        assert_eq!(ledger.deposit(&owner).unwrap().unwrap().coins, utok(10));
    }

    #[test]
    fn subtract_from_unknown_address_is_insufficient() {
        let params = Params::default();
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::new(&mut store, &params, 1);
        let err = ledger
            .subtract_deposit(&Address::new([9u8; 32]), &utok(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(store.is_empty());
    }
}
