//! Compiled contract artifacts in Hardhat's JSON layout.
use std::fs;

use camino::Utf8Path;
use ethers_core::{abi::Abi, types::Bytes};
use serde::Deserialize;

use crate::{abi::hex_to_bytes, HarnessError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: String,
    abi: Abi,
    bytecode: String,
}

/// What it takes to deploy an implementation: its ABI and creation bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn new(contract_name: impl Into<String>, abi: Abi, bytecode: impl Into<Bytes>) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
            bytecode: bytecode.into(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, HarnessError> {
        let raw: RawArtifact = serde_json::from_str(content)
            .map_err(|err| HarnessError::Artifact(format!("malformed artifact: {err}")))?;
        let bytecode = hex_to_bytes(&raw.bytecode)?;
        if bytecode.is_empty() {
            return Err(HarnessError::Artifact(format!(
                "{} has no creation bytecode",
                raw.contract_name
            )));
        }
        Ok(Self::new(raw.contract_name, raw.abi, bytecode))
    }

    pub fn load(path: &Utf8Path) -> Result<Self, HarnessError> {
        let content = fs::read_to_string(path)
            .map_err(|err| HarnessError::Artifact(format!("failed to read {path}: {err}")))?;
        let artifact = Self::from_json(&content)?;
        tracing::debug!(
            target: "deploy",
            %path,
            contract = %artifact.contract_name,
            bytes = artifact.bytecode.len(),
            "loaded artifact"
        );
        Ok(artifact)
    }
}
