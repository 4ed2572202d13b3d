use std::{fmt, time::Duration};

use ethers_core::types::H256;
use thiserror::Error;

/// Errors produced while talking to a ledger.
#[derive(Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<String>,
    },
    #[error("execution reverted{}", reason_suffix(.reason))]
    Reverted { reason: Option<String> },
    #[error("ledger does not support {0}")]
    Unsupported(String),
    #[error("transaction {hash:#x} not confirmed after {waited:?}")]
    ConfirmationTimeout { hash: H256, waited: Duration },
    #[error("failed to decode ledger response: {0}")]
    Decode(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl fmt::Debug for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Drops the request URL: endpoints derived from API keys carry the key in
/// their path.
impl From<reqwest::Error> for LedgerError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.without_url().to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}
