//! Multi-denomination coin amounts.
//!
//! All arithmetic is exact `u128` integer math. A denomination missing from a
//! [`Coins`] set is treated as zero, and zero entries are never stored, so two
//! equal balances always have identical serialized forms.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static DENOM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9/]{2,127}$").expect("static denom pattern"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoinError {
    #[error("invalid denomination: {0}")]
    InvalidDenom(String),
    #[error("coin amount overflow in {0}")]
    Overflow(String),
}

/// Check whether `denom` is an acceptable denomination name.
pub fn is_valid_denom(denom: &str) -> bool {
    DENOM_PATTERN.is_match(denom)
}

/// A single-denomination amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// A coin is valid when its denomination is well-formed and its amount positive.
    pub fn is_valid(&self) -> bool {
        is_valid_denom(&self.denom) && self.amount > 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A sorted set of coins keyed by denomination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a coin set, merging duplicate denominations and dropping zeros.
    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Result<Self, CoinError> {
        let mut set = Coins::new();
        for coin in coins {
            set.add_coin(&coin)?;
        }
        Ok(set)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Every denomination well-formed and at least one entry present.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .iter()
                .all(|(denom, amount)| is_valid_denom(denom) && *amount > 0)
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn coin_of(&self, denom: &str) -> Coin {
        Coin::new(denom, self.amount_of(denom))
    }

    pub fn add_coin(&mut self, coin: &Coin) -> Result<(), CoinError> {
        if !is_valid_denom(&coin.denom) {
            return Err(CoinError::InvalidDenom(coin.denom.clone()));
        }
        if coin.amount == 0 {
            return Ok(());
        }
        let current = self.amount_of(&coin.denom);
        let next = current
            .checked_add(coin.amount)
            .ok_or_else(|| CoinError::Overflow(coin.denom.clone()))?;
        self.0.insert(coin.denom.clone(), next);
        Ok(())
    }

    /// Componentwise sum.
    pub fn checked_add(&self, other: &Coins) -> Result<Coins, CoinError> {
        let mut sum = self.clone();
        for coin in other.iter() {
            sum.add_coin(&coin)?;
        }
        Ok(sum)
    }

    /// Componentwise difference, `None` if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut diff = self.clone();
        for (denom, amount) in other.0.iter() {
            let current = diff.amount_of(denom);
            let next = current.checked_sub(*amount)?;
            if next == 0 {
                diff.0.remove(denom);
            } else {
                diff.0.insert(denom.clone(), next);
            }
        }
        Some(diff)
    }

    /// True when every denomination of `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other
            .0
            .iter()
            .all(|(denom, amount)| self.amount_of(denom) >= *amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0
            .iter()
            .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        let mut set = Coins::new();
        if coin.amount > 0 {
            set.0.insert(coin.denom, coin.amount);
        }
        set
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0");
        }
        let parts: Vec<String> = self.iter().map(|coin| coin.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(entries: &[(&str, u128)]) -> Coins {
        Coins::from_coins(entries.iter().map(|(d, a)| Coin::new(*d, *a))).unwrap()
    }

    #[test]
    fn denom_validation() {
        assert!(is_valid_denom("utok"));
        assert!(is_valid_denom("ibc/abc123"));
        assert!(!is_valid_denom("ut"));
        assert!(!is_valid_denom("Utok"));
        assert!(!is_valid_denom("1tok"));
    }

    #[test]
    fn missing_denom_is_zero() {
        let balance = coins(&[("utok", 10)]);
        assert_eq!(balance.amount_of("uatom"), 0);
    }

    #[test]
    fn zero_entries_are_dropped() {
        let balance = coins(&[("utok", 10), ("uatom", 0)]);
        assert_eq!(balance.len(), 1);
        let drained = balance.checked_sub(&coins(&[("utok", 10)])).unwrap();
        assert!(drained.is_zero());
        assert_eq!(drained, Coins::new());
    }

    #[test]
    fn sub_never_goes_negative() {
        let balance = coins(&[("utok", 10)]);
        assert!(balance.checked_sub(&coins(&[("utok", 11)])).is_none());
        assert!(balance.checked_sub(&coins(&[("uatom", 1)])).is_none());
    }

    #[test]
    fn add_merges_denominations() {
        let sum = coins(&[("utok", 10)])
            .checked_add(&coins(&[("utok", 5), ("uatom", 1)]))
            .unwrap();
        assert_eq!(sum.amount_of("utok"), 15);
        assert_eq!(sum.amount_of("uatom"), 1);
        assert_eq!(sum.to_string(), "1uatom,15utok");
    }

    #[test]
    fn overflow_is_reported() {
        let max = coins(&[("utok", u128::MAX)]);
        assert_eq!(
            max.checked_add(&coins(&[("utok", 1)])),
            Err(CoinError::Overflow("utok".into()))
        );
    }

    #[test]
    fn validity() {
        assert!(coins(&[("utok", 1)]).is_valid());
        assert!(!Coins::new().is_valid());
        assert!(Coin::new("utok", 1).is_valid());
        assert!(!Coin::new("utok", 0).is_valid());
    }
}
