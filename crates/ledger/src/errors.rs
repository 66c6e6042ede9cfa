//! Error types for the ledger engine

use bwhub_storage::StorageError;
use thiserror::Error;

/// Every rejection the engine can produce. All of them are raised before the
/// message's buffered writes are committed, so an error never leaves partial
/// state behind.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("stale report: {0}")]
    StaleReport(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn insufficient(required: impl ToString, available: impl ToString) -> Self {
        LedgerError::InsufficientFunds {
            required: required.to_string(),
            available: available.to_string(),
        }
    }

    /// Stable numeric code, suitable for transaction receipts.
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::InvalidField(_) => 1,
            LedgerError::NotFound { .. } => 2,
            LedgerError::Unauthorized(_) => 3,
            LedgerError::InvalidState(_) => 4,
            LedgerError::InsufficientFunds { .. } => 5,
            LedgerError::QuotaExceeded(_) => 6,
            LedgerError::StaleReport(_) => 7,
            LedgerError::Storage(_) => 100,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
