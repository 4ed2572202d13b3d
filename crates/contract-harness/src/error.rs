use std::{fmt, time::Duration};

use ethers_core::types::{Address, H256, U256};
use ledger::LedgerError;
use thiserror::Error;

use crate::{balance::Asset, identity::IdentityMode, snapshot::PropertyDiff, upgrade::UpgradeState};

/// Privileged roles the workflow acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owner of the proxy administration contract.
    ProxyAdminOwner,
    Beneficiary,
    Controller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProxyAdminOwner => write!(f, "proxy admin owner"),
            Self::Beneficiary => write!(f, "beneficiary"),
            Self::Controller => write!(f, "controller"),
        }
    }
}

/// Error type returned by the harness. Every variant is fatal to the current
/// run; nothing is retried.
#[derive(Error)]
pub enum HarnessError {
    #[error("{mode} identities are not supported by this ledger: {reason}")]
    UnsupportedMode { mode: IdentityMode, reason: String },
    #[error("no {mode} credential configured{}", address_suffix(.address))]
    NoCredential {
        mode: IdentityMode,
        address: Option<Address>,
    },
    #[error(
        "identity {address:#x} was acquired in ledger epoch {acquired}, ledger is now at epoch {current}"
    )]
    StaleIdentity {
        address: Address,
        acquired: u64,
        current: u64,
    },
    #[error("deployment of {contract} failed: {detail}")]
    DeploymentReverted { contract: String, detail: String },
    #[error("contract {address:#x} is already initialized")]
    AlreadyInitialized { address: Address },
    #[error("{caller:#x} is not the {role} of {contract:#x} (held by {holder:#x})")]
    Unauthorized {
        role: Role,
        contract: Address,
        caller: Address,
        holder: Address,
    },
    #[error("proxy {proxy:#x} resolves to {actual:#x}, expected {expected:#x}")]
    UpgradeVerificationFailed {
        proxy: Address,
        expected: Address,
        actual: Address,
    },
    #[error("invariant violated: {context}\n{}", render_diff(.diff))]
    InvariantViolation {
        context: String,
        diff: Vec<PropertyDiff>,
    },
    #[error("withdrawing {asset} from {contract:#x} left {remaining} behind")]
    IncompleteWithdrawal {
        asset: Asset,
        contract: Address,
        remaining: U256,
    },
    #[error(
        "burned {amount} from {from:#x} (tx {burn_tx:#x}) but minting to {to:#x} failed: {cause}; \
         a compensating mint of {amount} is required"
    )]
    PartialRebalance {
        from: Address,
        to: Address,
        amount: U256,
        burn_tx: H256,
        cause: Box<HarnessError>,
    },
    #[error("transaction {hash:#x} not confirmed after {waited:?}")]
    ConfirmationTimeout { hash: H256, waited: Duration },
    #[error("{operation} reverted{}", reason_suffix(.reason))]
    Reverted {
        operation: String,
        reason: Option<String>,
    },
    #[error("node quotes a gas price of {quoted} wei, above the cap of {cap} wei")]
    FeeCapExceeded { quoted: U256, cap: U256 },
    #[error("cannot {action} while the upgrade is {state}")]
    InvalidTransition {
        state: UpgradeState,
        action: &'static str,
    },
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("artifact error: {0}")]
    Artifact(String),
    #[error("abi encoding failed: {0}")]
    Abi(#[from] ethers_core::abi::Error),
    #[error("failed to parse function signature: {0}")]
    AbiSignature(#[from] ethers_core::abi::ParseError),
    #[error("unexpected return data from {function}: {detail}")]
    Decode { function: String, detail: String },
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl fmt::Debug for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<LedgerError> for HarnessError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::ConfirmationTimeout { hash, waited } => {
                Self::ConfirmationTimeout { hash, waited }
            }
            other => Self::Ledger(other),
        }
    }
}

impl HarnessError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMode { .. } => "UnsupportedMode",
            Self::NoCredential { .. } => "NoCredential",
            Self::StaleIdentity { .. } => "StaleIdentity",
            Self::DeploymentReverted { .. } => "DeploymentReverted",
            Self::AlreadyInitialized { .. } => "AlreadyInitialized",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::UpgradeVerificationFailed { .. } => "UpgradeVerificationFailed",
            Self::InvariantViolation { .. } => "InvariantViolation",
            Self::IncompleteWithdrawal { .. } => "IncompleteWithdrawal",
            Self::PartialRebalance { .. } => "PartialRebalance",
            Self::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            Self::Reverted { .. } => "Reverted",
            Self::FeeCapExceeded { .. } => "FeeCapExceeded",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::InvalidParameters(_) => "InvalidParameters",
            Self::Artifact(_) => "Artifact",
            Self::Abi(_) | Self::AbiSignature(_) => "Abi",
            Self::Decode { .. } => "Decode",
            Self::Ledger(_) => "Ledger",
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

fn address_suffix(address: &Option<Address>) -> String {
    match address {
        Some(address) => format!(" for {address:#x}"),
        None => String::new(),
    }
}

fn render_diff(diff: &[PropertyDiff]) -> String {
    diff.iter()
        .map(|entry| format!("  {entry}"))
        .collect::<Vec<_>>()
        .join("\n")
}
