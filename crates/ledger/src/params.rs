use crate::errors::{LedgerError, Result};
use bwhub_types::{Height, Status};
use serde::{Deserialize, Serialize};

/// Default liveness window: a node that has not sent a heartbeat for this
/// many blocks is swept to `Inactive`.
pub const DEFAULT_INACTIVE_DURATION: Height = 50;

/// Maximum length of free-form node fields (remote URL, version).
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 64;

/// Engine parameters. Fixed for the lifetime of an [`crate::App`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub inactive_duration: Height,
    pub plan_initial_status: Status,
    pub max_field_length: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            inactive_duration: DEFAULT_INACTIVE_DURATION,
            plan_initial_status: Status::Inactive,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.inactive_duration == 0 {
            return Err(LedgerError::InvalidField("inactive_duration"));
        }
        if !self.plan_initial_status.is_valid() {
            return Err(LedgerError::InvalidField("plan_initial_status"));
        }
        if self.max_field_length == 0 {
            return Err(LedgerError::InvalidField("max_field_length"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.plan_initial_status, Status::Inactive);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let params: Params = serde_json::from_str(r#"{"inactive_duration": 10}"#).unwrap();
        assert_eq!(params.inactive_duration, 10);
        assert_eq!(params.max_field_length, DEFAULT_MAX_FIELD_LENGTH);
    }

    #[test]
    fn zero_window_rejected() {
        let params = Params {
            inactive_duration: 0,
            ..Params::default()
        };
        assert!(matches!(
            params.validate(),
            Err(LedgerError::InvalidField("inactive_duration"))
        ));
    }
}
