//! Token balance collaborator.
//!
//! The engine never moves balances itself: it computes amounts and asks a
//! [`Bank`] to credit or debit accounts. While a message runs, those calls go
//! to a [`CacheBank`] that checks them against an overlay of the committed
//! balances and journals them; the journal is applied to the real bank only
//! after the store writes have been committed.

use crate::errors::{LedgerError, Result};
use bwhub_types::{Address, Coins};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interface for token balance operations.
pub trait Bank {
    /// Credit an account. Never fails for a valid amount.
    fn credit(&mut self, address: &Address, coins: &Coins) -> Result<()>;

    /// Debit an account, failing with `InsufficientFunds` if any denomination
    /// is not covered.
    fn debit(&mut self, address: &Address, coins: &Coins) -> Result<()>;

    /// Retrieve an account balance.
    fn balance(&self, address: &Address) -> Coins;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankCall {
    Credit(Address, Coins),
    Debit(Address, Coins),
}

impl BankCall {
    pub fn apply(&self, bank: &mut dyn Bank) -> Result<()> {
        match self {
            BankCall::Credit(address, coins) => bank.credit(address, coins),
            BankCall::Debit(address, coins) => bank.debit(address, coins),
        }
    }
}

// -----------------------------------------------------------------------------
// Journaling overlay
// -----------------------------------------------------------------------------

/// Buffers bank calls over a read-only parent. Balances seen through the
/// cache include the buffered calls; the parent is untouched until the
/// journal returned by [`CacheBank::into_calls`] is applied.
pub struct CacheBank<'a> {
    parent: &'a dyn Bank,
    balances: BTreeMap<Address, Coins>,
    calls: Vec<BankCall>,
}

impl<'a> CacheBank<'a> {
    pub fn new(parent: &'a dyn Bank) -> Self {
        Self {
            parent,
            balances: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn into_calls(self) -> Vec<BankCall> {
        self.calls
    }
}

impl Bank for CacheBank<'_> {
    fn credit(&mut self, address: &Address, coins: &Coins) -> Result<()> {
        let next = self
            .balance(address)
            .checked_add(coins)
            .map_err(coin_overflow)?;
        self.balances.insert(*address, next);
        self.calls.push(BankCall::Credit(*address, coins.clone()));
        Ok(())
    }

    fn debit(&mut self, address: &Address, coins: &Coins) -> Result<()> {
        let current = self.balance(address);
        let next = current
            .checked_sub(coins)
            .ok_or_else(|| LedgerError::insufficient(coins, &current))?;
        self.balances.insert(*address, next);
        self.calls.push(BankCall::Debit(*address, coins.clone()));
        Ok(())
    }

    fn balance(&self, address: &Address) -> Coins {
        match self.balances.get(address) {
            Some(coins) => coins.clone(),
            None => self.parent.balance(address),
        }
    }
}

// -----------------------------------------------------------------------------
// In-memory implementation (replay node and tests)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryBank {
    balances: BTreeMap<Address, Coins>,
    total_supply: Coins,
    #[serde(skip)]
    calls: Vec<BankCall>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed balances, e.g. from a genesis file.
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, Coins)>) -> Result<Self> {
        let mut bank = Self::new();
        for (address, coins) in balances {
            bank.credit(&address, &coins)?;
        }
        bank.calls.clear();
        Ok(bank)
    }

    pub fn total_supply(&self) -> &Coins {
        &self.total_supply
    }

    pub fn balances(&self) -> &BTreeMap<Address, Coins> {
        &self.balances
    }

    pub fn calls(&self) -> &[BankCall] {
        &self.calls
    }

}

fn coin_overflow(err: bwhub_types::CoinError) -> LedgerError {
    tracing::error!(%err, "bank balance overflow");
    LedgerError::InvalidField("coins")
}

impl Bank for InMemoryBank {
    fn credit(&mut self, address: &Address, coins: &Coins) -> Result<()> {
        self.calls.push(BankCall::Credit(*address, coins.clone()));
        let current = self.balance(address);
        let next = current.checked_add(coins).map_err(coin_overflow)?;
        self.total_supply = self.total_supply.checked_add(coins).map_err(coin_overflow)?;
        self.balances.insert(*address, next);
        Ok(())
    }

    fn debit(&mut self, address: &Address, coins: &Coins) -> Result<()> {
        self.calls.push(BankCall::Debit(*address, coins.clone()));
        let current = self.balance(address);
        let next = current
            .checked_sub(coins)
            .ok_or_else(|| LedgerError::insufficient(coins, &current))?;
        self.total_supply = self
            .total_supply
            .checked_sub(coins)
            .ok_or_else(|| LedgerError::insufficient(coins, &self.total_supply))?;
        if next.is_zero() {
            self.balances.remove(address);
        } else {
            self.balances.insert(*address, next);
        }
        Ok(())
    }

    fn balance(&self, address: &Address) -> Coins {
        self.balances.get(address).cloned().unwrap_or_default()
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use bwhub_types::Coin;

    fn test_address(n: u8) -> Address {
        Address::new([n; 32])
    }

    fn utok(amount: u128) -> Coins {
        Coins::from(Coin::new("utok", amount))
    }

    #[test]
    fn test_in_memory_bank_operations() {
        let mut bank = InMemoryBank::new();
        let alice = test_address(1);

        bank.credit(&alice, &utok(1000)).unwrap();
        assert_eq!(bank.balance(&alice), utok(1000));
        assert_eq!(bank.total_supply(), &utok(1000));

        bank.debit(&alice, &utok(300)).unwrap();
        assert_eq!(bank.balance(&alice), utok(700));
        assert_eq!(bank.total_supply(), &utok(700));
    }

    #[test]
    fn test_insufficient_balance() {
        let mut bank = InMemoryBank::new();
        let alice = test_address(1);
        bank.credit(&alice, &utok(1000)).unwrap();

        let result = bank.debit(&alice, &utok(1500));
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(bank.balance(&alice), utok(1000));
    }

    #[test]
    fn test_cache_bank_defers_calls() {
        let alice = test_address(1);
        let bob = test_address(2);
        let mut bank = InMemoryBank::with_balances([(alice, utok(10))]).unwrap();

        let calls = {
            let mut cache = CacheBank::new(&bank);
            cache.debit(&alice, &utok(4)).unwrap();
            cache.credit(&bob, &utok(4)).unwrap();
            assert_eq!(cache.balance(&alice), utok(6));
            assert_eq!(cache.balance(&bob), utok(4));
            assert!(matches!(
                cache.debit(&alice, &utok(7)),
                Err(LedgerError::InsufficientFunds { .. })
            ));
            cache.into_calls()
        };
        assert_eq!(bank.balance(&alice), utok(10));
        assert!(bank.calls().is_empty());

        for call in &calls {
            call.apply(&mut bank).unwrap();
        }
        assert_eq!(bank.balance(&alice), utok(6));
        assert_eq!(bank.balance(&bob), utok(4));
        assert_eq!(bank.total_supply(), &utok(10));
    }

    #[test]
    fn test_dropped_cache_bank_leaves_parent_untouched() {
        let alice = test_address(1);
        let bank = InMemoryBank::with_balances([(alice, utok(10))]).unwrap();
        {
            let mut cache = CacheBank::new(&bank);
            cache.debit(&alice, &utok(10)).unwrap();
            assert!(cache.balance(&alice).is_zero());
        }
        assert_eq!(bank.balance(&alice), utok(10));
    }

    #[test]
    fn test_calls_are_recorded() {
        let alice = test_address(1);
        let mut bank = InMemoryBank::with_balances([(alice, utok(10))]).unwrap();
        assert!(bank.calls().is_empty());

        bank.debit(&alice, &utok(4)).unwrap();
        bank.credit(&alice, &utok(1)).unwrap();
        assert_eq!(
            bank.calls(),
            &[
                BankCall::Debit(alice, utok(4)),
                BankCall::Credit(alice, utok(1)),
            ]
        );
    }
}
