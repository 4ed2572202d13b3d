use colored::Colorize;
use contract_harness::{deploy, ContractHandle, Dat, InitializeParams};
use ethers_core::types::Address;

use crate::{context::Context, error::CliError};

/// Deploys a master copy and initializes it as `DAT`/`DAT` so nobody else can.
pub fn deploy(context: &Context, hardware: bool) -> Result<(), CliError> {
    let session = context.session();
    let identities = context.identities(hardware)?;
    let deployer = context.deployer(&identities, hardware)?;
    let artifact = context.artifact()?;

    let params = InitializeParams::bootstrap("DAT", "DAT");
    let (dat, receipt) = deploy::deploy_and_initialize(&session, &artifact, &deployer, &params)?;
    println!("{} {:#x}", "DAT deployed to".green(), dat.address());
    println!("DAT initialized tx hash: {:#x}", receipt.transaction_hash);
    Ok(())
}

pub fn initialize(context: &Context, dat: Address, hardware: bool) -> Result<(), CliError> {
    let session = context.session();
    let identities = context.identities(hardware)?;
    let deployer = context.deployer(&identities, hardware)?;
    let artifact = match context.artifact() {
        Ok(artifact) => Some(artifact),
        Err(err) => {
            tracing::debug!(target: "deploy", %err, "initializing without an ABI check");
            None
        }
    };

    let handle = ContractHandle::<Dat>::new(dat, deployer);
    let params = InitializeParams::bootstrap("DXdao", "DXD");
    let receipt = deploy::initialize(&session, &handle, &params, artifact.as_ref())?;
    println!("DAT initialized tx hash: {:#x}", receipt.transaction_hash);
    Ok(())
}
