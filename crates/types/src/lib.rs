//! Value types shared across the bandwidth marketplace ledger.

pub mod address;
pub mod bandwidth;
pub mod coin;
pub mod status;

pub use address::*;
pub use bandwidth::*;
pub use coin::*;
pub use status::*;
