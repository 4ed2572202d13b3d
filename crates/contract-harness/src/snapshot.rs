//! Point-in-time records of a contract's observable configuration.
use std::fmt;

use ethers_core::types::Address;
use ordermap::OrderMap;
use serde::{Deserialize, Serialize};

use crate::{
    abi::render_token,
    contracts::{ContractHandle, Dat},
    HarnessError, Session,
};

/// A named, parameterless view function of the governed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    TotalSupply,
    Beneficiary,
    Control,
    Name,
    Symbol,
    Decimals,
    FeeBasisPoints,
    AutoBurn,
    RevenueCommitmentBasisPoints,
    MinInvestment,
    OpenUntilAtLeast,
}

impl Property {
    /// Everything an upgrade must leave untouched.
    pub const ALL: [Property; 11] = [
        Property::TotalSupply,
        Property::Beneficiary,
        Property::Control,
        Property::Name,
        Property::Symbol,
        Property::Decimals,
        Property::FeeBasisPoints,
        Property::AutoBurn,
        Property::RevenueCommitmentBasisPoints,
        Property::MinInvestment,
        Property::OpenUntilAtLeast,
    ];

    /// Bonding-curve configuration; unaffected by a change of roles.
    pub const ECONOMIC: [Property; 5] = [
        Property::FeeBasisPoints,
        Property::AutoBurn,
        Property::RevenueCommitmentBasisPoints,
        Property::MinInvestment,
        Property::OpenUntilAtLeast,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::TotalSupply => "totalSupply",
            Self::Beneficiary => "beneficiary",
            Self::Control => "control",
            Self::Name => "name",
            Self::Symbol => "symbol",
            Self::Decimals => "decimals",
            Self::FeeBasisPoints => "feeBasisPoints",
            Self::AutoBurn => "autoBurn",
            Self::RevenueCommitmentBasisPoints => "revenueCommitmentBasisPoints",
            Self::MinInvestment => "minInvestment",
            Self::OpenUntilAtLeast => "openUntilAtLeast",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|property| property.key() == key)
    }

    fn return_type(self) -> &'static str {
        match self {
            Self::Beneficiary | Self::Control => "address",
            Self::Name | Self::Symbol => "string",
            Self::Decimals => "uint8",
            Self::AutoBurn => "bool",
            _ => "uint256",
        }
    }

    fn signature(self) -> String {
        format!(
            "function {}() external view returns ({})",
            self.key(),
            self.return_type()
        )
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One property whose value differs between two snapshots. `None` means the
/// property is absent from that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    pub key: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PropertyDiff {
    pub fn new(key: impl Into<String>, before: Option<String>, after: Option<String>) -> Self {
        Self {
            key: key.into(),
            before,
            after,
        }
    }
}

impl fmt::Display for PropertyDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.key,
            self.before.as_deref().unwrap_or("<missing>"),
            self.after.as_deref().unwrap_or("<missing>")
        )
    }
}

/// Property values of one contract, all read at the same block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub contract: Address,
    pub block: u64,
    pub properties: OrderMap<String, String>,
}

impl StateSnapshot {
    /// Reads `properties` through `handle`, pinned to the current block.
    pub fn capture(
        session: &Session<'_>,
        handle: &ContractHandle<Dat>,
        properties: &[Property],
    ) -> Result<Self, HarnessError> {
        let block = session.block_number()?;
        let mut values = OrderMap::with_capacity(properties.len());
        for property in properties {
            let tokens = handle.read_tokens(session, &property.signature(), Some(block))?;
            let value = tokens.first().map(render_token).ok_or_else(|| HarnessError::Decode {
                function: property.key().to_string(),
                detail: "empty return data".to_string(),
            })?;
            values.insert(property.key().to_string(), value);
        }
        tracing::info!(
            target: "snapshot",
            contract = %format!("{:#x}", handle.address()),
            block,
            properties = values.len(),
            "captured snapshot"
        );
        Ok(Self {
            contract: handle.address(),
            block,
            properties: values,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| HarnessError::InvalidParameters(format!("snapshot encoding: {err}")))
    }

    pub fn from_json(content: &str) -> Result<Self, HarnessError> {
        serde_json::from_str(content)
            .map_err(|err| HarnessError::InvalidParameters(format!("malformed snapshot: {err}")))
    }
}

/// Re-reads the properties `baseline` holds from `handle` and fails with the
/// diff if any of them changed since the baseline was taken.
pub fn compare_with_baseline(
    session: &Session<'_>,
    handle: &ContractHandle<Dat>,
    baseline: &StateSnapshot,
) -> Result<StateSnapshot, HarnessError> {
    if baseline.contract != handle.address() {
        return Err(HarnessError::InvalidParameters(format!(
            "baseline was taken of {:#x}, not {:#x}",
            baseline.contract,
            handle.address()
        )));
    }
    let properties = baseline
        .properties
        .keys()
        .map(|key| {
            Property::from_key(key).ok_or_else(|| {
                HarnessError::InvalidParameters(format!("unknown snapshot property `{key}`"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let current = StateSnapshot::capture(session, handle, &properties)?;
    assert_equivalent(
        baseline,
        &current,
        &format!("state changed since block {}", baseline.block),
    )?;
    Ok(current)
}

/// Keys whose values differ, in `before`'s order followed by keys only
/// `after` has.
pub fn diff(before: &StateSnapshot, after: &StateSnapshot) -> Vec<PropertyDiff> {
    let mut changes: Vec<PropertyDiff> = before
        .properties
        .iter()
        .filter_map(|(key, value)| match after.properties.get(key) {
            Some(other) if other == value => None,
            other => Some(PropertyDiff::new(key.clone(), Some(value.clone()), other.cloned())),
        })
        .collect();
    changes.extend(
        after
            .properties
            .iter()
            .filter(|(key, _)| !before.properties.contains_key(*key))
            .map(|(key, value)| PropertyDiff::new(key.clone(), None, Some(value.clone()))),
    );
    changes
}

/// Fails with the full diff unless both snapshots hold the same keys with the
/// same values.
pub fn assert_equivalent(
    before: &StateSnapshot,
    after: &StateSnapshot,
    context: &str,
) -> Result<(), HarnessError> {
    let changes = diff(before, after);
    if changes.is_empty() {
        return Ok(());
    }
    tracing::error!(target: "snapshot", context, changed = changes.len(), "snapshots differ");
    Err(HarnessError::InvariantViolation {
        context: context.to_string(),
        diff: changes,
    })
}
