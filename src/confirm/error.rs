use serde_json::Value;
use thiserror::Error;

use super::SessionState;
use crate::chain::lcd::LcdError;
use crate::chain::types::TxInfo;
use crate::chain::wallet::KeyError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    #[error("{0}")]
    Simulation(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("{0}")]
    KeyAcquisition(String),

    /// Rejected at broadcast; `raw_log` is shown verbatim
    #[error("{raw_log}")]
    Broadcast { code: u32, raw_log: String },

    /// Included in a block but failed on chain
    #[error("{0}")]
    Chain(String),

    #[error("{0}")]
    Unknown(String),

    #[error("Fee calculator is not ready")]
    NotReady,

    #[error("Insufficient balance for any fee denomination")]
    NoFeeDenom,

    #[error("Invalid fee")]
    InvalidFee,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Polling was cancelled")]
    Cancelled,

    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: SessionState },
}

impl ConfirmError {
    /// Errors raised before anything reached the chain
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConfirmError::NotReady
                | ConfirmError::NoFeeDenom
                | ConfirmError::InvalidFee
                | ConfirmError::PasswordRequired
                | ConfirmError::InvalidState { .. }
        )
    }
}

/// Error message embedded in a transaction's raw log: a JSON array whose
/// first entry carries a `log` string that is itself a JSON object with a
/// `message`. Anything else yields `None`.
pub fn check_error(raw_log: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(raw_log).ok()?;
    let log = parsed.as_array()?.first()?.get("log")?.as_str()?;
    let log: Value = serde_json::from_str(log).ok()?;

    log.get("message")?.as_str().map(str::to_string)
}

/// On-chain failure of an included transaction, if any
pub fn chain_error(info: &TxInfo, default: &str) -> Option<String> {
    if let Some(message) = check_error(&info.raw_log) {
        return Some(message);
    }

    if info.code != 0 {
        let raw = info.raw_log.trim();
        return Some(if raw.is_empty() { default.to_string() } else { raw.to_string() });
    }

    None
}

/// User-facing message for an LCD failure
pub fn parse_error(error: &LcdError, default: &str) -> String {
    error.user_message(default)
}

impl From<KeyError> for ConfirmError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::IncorrectPassword => ConfirmError::IncorrectPassword,
            KeyError::Signing(message) => ConfirmError::Unknown(message),
            other => ConfirmError::KeyAcquisition(other.to_string()),
        }
    }
}
