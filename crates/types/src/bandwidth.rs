use serde::{Deserialize, Serialize};
use std::fmt;

/// Upload/download byte counters. Used both for allocations and for usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bandwidth {
    pub upload: u64,
    pub download: u64,
}

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth {
        upload: 0,
        download: 0,
    };

    pub const fn new(upload: u64, download: u64) -> Self {
        Self { upload, download }
    }

    pub fn is_all_zero(&self) -> bool {
        self.upload == 0 && self.download == 0
    }

    pub fn is_any_zero(&self) -> bool {
        self.upload == 0 || self.download == 0
    }

    pub fn is_all_positive(&self) -> bool {
        !self.is_any_zero()
    }

    pub fn checked_add(&self, other: &Bandwidth) -> Option<Bandwidth> {
        Some(Bandwidth {
            upload: self.upload.checked_add(other.upload)?,
            download: self.download.checked_add(other.download)?,
        })
    }

    /// Componentwise difference, `None` if either direction would go negative.
    pub fn checked_sub(&self, other: &Bandwidth) -> Option<Bandwidth> {
        Some(Bandwidth {
            upload: self.upload.checked_sub(other.upload)?,
            download: self.download.checked_sub(other.download)?,
        })
    }

    /// `self <= other` in both directions.
    pub fn is_all_lte(&self, other: &Bandwidth) -> bool {
        self.upload <= other.upload && self.download <= other.download
    }

    /// Bytes moved in both directions.
    pub fn total(&self) -> u128 {
        self.upload as u128 + self.download as u128
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}up/{}down", self.upload, self.download)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_are_componentwise() {
        let a = Bandwidth::new(45, 10);
        let b = Bandwidth::new(40, 40);
        assert!(!a.is_all_lte(&b));
        assert!(!b.is_all_lte(&a));
        assert!(Bandwidth::new(40, 10).is_all_lte(&b));
    }

    #[test]
    fn sub_and_add_are_checked() {
        let a = Bandwidth::new(5, 5);
        assert_eq!(a.checked_sub(&Bandwidth::new(6, 0)), None);
        assert_eq!(Bandwidth::new(u64::MAX, 0).checked_add(&Bandwidth::new(1, 0)), None);
        assert_eq!(a.checked_add(&a), Some(Bandwidth::new(10, 10)));
    }

    #[test]
    fn zero_checks() {
        assert!(Bandwidth::ZERO.is_all_zero());
        assert!(Bandwidth::new(0, 5).is_any_zero());
        assert!(!Bandwidth::new(0, 5).is_all_zero());
        assert!(Bandwidth::new(1, 5).is_all_positive());
        assert_eq!(Bandwidth::new(u64::MAX, u64::MAX).total(), 2 * u64::MAX as u128);
    }
}
