//! Deploying implementations and running their initializer.
use ledger::TransactionReceipt;

use crate::{
    contracts::{ContractHandle, Dat, InitializeParams, Interface},
    session::Call,
    ContractArtifact, HarnessError, Identity, Session,
};

/// Deploys `artifact` as `identity` and returns a handle bound to the new
/// address under the same identity.
pub fn deploy<C: Interface>(
    session: &Session<'_>,
    artifact: &ContractArtifact,
    identity: &Identity,
) -> Result<ContractHandle<C>, HarnessError> {
    tracing::info!(
        target: "deploy",
        contract = %artifact.contract_name,
        from = %format!("{:#x}", identity.address()),
        "deploying"
    );
    let receipt = session
        .submit(
            identity,
            Call::create(artifact.bytecode.clone()),
            &format!("deploy {}", artifact.contract_name),
        )
        .map_err(|err| match err {
            HarnessError::Reverted { reason, .. } => HarnessError::DeploymentReverted {
                contract: artifact.contract_name.clone(),
                detail: reason.unwrap_or_else(|| "creation reverted".to_string()),
            },
            other => other,
        })?;
    let address = receipt
        .contract_address
        .ok_or_else(|| HarnessError::DeploymentReverted {
            contract: artifact.contract_name.clone(),
            detail: format!(
                "receipt for {:#x} carries no contract address",
                receipt.transaction_hash
            ),
        })?;
    if session.ledger().code(address)?.is_empty() {
        return Err(HarnessError::DeploymentReverted {
            contract: artifact.contract_name.clone(),
            detail: format!("no code at {address:#x}"),
        });
    }
    tracing::info!(
        target: "deploy",
        contract = %artifact.contract_name,
        address = %format!("{address:#x}"),
        block = receipt.block_number,
        "deployed"
    );
    Ok(ContractHandle::new(address, identity.clone()))
}

/// Runs the one-time initializer through `handle`.
///
/// A revert is re-checked read-only: if the contract already reports a name,
/// it was initialized before and [`HarnessError::AlreadyInitialized`] is
/// returned.
pub fn initialize(
    session: &Session<'_>,
    handle: &ContractHandle<Dat>,
    params: &InitializeParams,
    artifact: Option<&ContractArtifact>,
) -> Result<TransactionReceipt, HarnessError> {
    params.validate(artifact.map(|artifact| &artifact.abi))?;
    match handle.initialize(session, params) {
        Ok(receipt) => {
            tracing::info!(
                target: "deploy",
                address = %format!("{:#x}", handle.address()),
                hash = %format!("{:#x}", receipt.transaction_hash),
                name = %params.name,
                "initialized"
            );
            Ok(receipt)
        }
        Err(err @ HarnessError::Reverted { .. }) => match handle.name(session) {
            Ok(name) if !name.is_empty() => Err(HarnessError::AlreadyInitialized {
                address: handle.address(),
            }),
            _ => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Deploys a fresh copy and initializes it in one go.
pub fn deploy_and_initialize(
    session: &Session<'_>,
    artifact: &ContractArtifact,
    identity: &Identity,
    params: &InitializeParams,
) -> Result<(ContractHandle<Dat>, TransactionReceipt), HarnessError> {
    let handle = deploy::<Dat>(session, artifact, identity)?;
    let receipt = initialize(session, &handle, params, Some(artifact))?;
    Ok((handle, receipt))
}
