//! Single steps of the upgrade campaign, and the campaign itself.
use std::fs;

use camino::Utf8Path;
use colored::Colorize;
use contract_harness::{
    governance::{self, RoleAssignment},
    rebalance::{self, Rebalance},
    snapshot::{self, assert_equivalent},
    treasury::{self, Withdrawal},
    Asset, Campaign, ContractHandle, Dat, IdentityMode, Property, ProxyAdmin, StateSnapshot,
    UpgradeController,
};
use ethers_core::types::{Address, U256};

use crate::{context::Context, error::CliError, AssetChoice};

/// Prints or stores the proxy's observable state, or checks it against a
/// snapshot stored earlier.
pub fn snapshot(
    context: &Context,
    out: Option<&Utf8Path>,
    compare: Option<&Utf8Path>,
) -> Result<(), CliError> {
    let contracts = &context.settings.config.contracts;
    let proxy = context.require(contracts.proxy, "contracts.proxy")?;
    let session = context.session();
    let identities = context.identities(false)?;
    // Reads never send from the caller; any identity will do.
    let reader = match identities.default_identity(IdentityMode::Keyed) {
        Ok(identity) => identity,
        Err(_) => identities.acquire(
            context.require(contracts.administrator, "contracts.administrator")?,
            IdentityMode::Impersonate,
        )?,
    };

    let dat = ContractHandle::<Dat>::new(proxy, reader);
    if let Some(path) = compare {
        let content = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_owned(),
            source,
        })?;
        let baseline = StateSnapshot::from_json(&content)?;
        let current = snapshot::compare_with_baseline(&session, &dat, &baseline)?;
        println!(
            "{} {} properties unchanged between block {} and block {}",
            "Snapshot matches:".green(),
            current.properties.len(),
            baseline.block,
            current.block
        );
        return Ok(());
    }

    let snapshot = StateSnapshot::capture(&session, &dat, &Property::ALL)?;
    match out {
        Some(path) => {
            fs::write(path, snapshot.to_json()?).map_err(|source| CliError::Write {
                path: path.to_owned(),
                source,
            })?;
            println!("Snapshot of {proxy:#x} at block {} written to {path}", snapshot.block);
        }
        None => {
            println!("{proxy:#x} at block {}", snapshot.block);
            for (key, value) in &snapshot.properties {
                println!("  {key:<24} {value}");
            }
        }
    }
    Ok(())
}

/// Replaces the proxy's implementation and checks the observable state is
/// unchanged.
pub fn upgrade(context: &Context) -> Result<(), CliError> {
    let contracts = &context.settings.config.contracts;
    let proxy = context.require(contracts.proxy, "contracts.proxy")?;
    let proxy_admin = context.require(contracts.proxy_admin, "contracts.proxy_admin")?;
    let session = context.session();
    let identities = context.identities(false)?;
    let deployer = context.deployer(&identities, false)?;
    let admin = context.administrator(&session, &identities)?;
    let artifact = context.artifact()?;

    let implementation = contract_harness::deploy::deploy::<Dat>(&session, &artifact, &deployer)?;
    println!("New implementation deployed to {:#x}", implementation.address());

    let dat = ContractHandle::<Dat>::new(proxy, admin.clone());
    let before = StateSnapshot::capture(&session, &dat, &Property::ALL)?;
    let mut controller = UpgradeController::new(
        ContractHandle::<ProxyAdmin>::new(proxy_admin, admin),
        proxy,
        implementation.address(),
    );
    let receipt = controller.upgrade(&session)?;
    println!("Proxy upgraded in tx {:#x}", receipt.transaction_hash);
    controller.verify(&session)?;
    let after = StateSnapshot::capture(&session, &dat, &Property::ALL)?;
    assert_equivalent(&before, &after, "state changed across upgrade")?;
    println!(
        "{} {} properties unchanged",
        "Upgrade verified:".green(),
        after.properties.len()
    );
    Ok(())
}

pub fn withdraw(context: &Context, asset: AssetChoice) -> Result<(), CliError> {
    let contracts = &context.settings.config.contracts;
    let proxy = context.require(contracts.proxy, "contracts.proxy")?;
    let session = context.session();
    let identities = context.identities(false)?;
    let admin = context.administrator(&session, &identities)?;
    let dat = ContractHandle::<Dat>::new(proxy, admin);

    let withdrawals = match asset {
        AssetChoice::Native => vec![treasury::withdraw(&session, &dat, Asset::Native)?],
        AssetChoice::Token => {
            let token = context.require(contracts.treasury_token, "contracts.treasury_token")?;
            vec![treasury::withdraw(&session, &dat, Asset::Token(token))?]
        }
        AssetChoice::All => {
            let token = context.require(contracts.treasury_token, "contracts.treasury_token")?;
            treasury::withdraw_all(&session, &dat, token)?
        }
    };
    for withdrawal in &withdrawals {
        print_withdrawal(withdrawal);
    }
    Ok(())
}

fn print_withdrawal(withdrawal: &Withdrawal) {
    println!(
        "Withdrew {} of {} to {:#x} in tx {:#x}",
        withdrawal.amount(),
        withdrawal.asset,
        withdrawal.destination_after.address,
        withdrawal.receipt.transaction_hash
    );
    if !withdrawal.fee.is_zero() {
        println!("  fee paid: {} wei", withdrawal.fee);
    }
}

/// Moves `amount` (or everything) from the vesting holder to its beneficiary.
pub fn rebalance(context: &Context, amount: Option<U256>) -> Result<(), CliError> {
    let contracts = &context.settings.config.contracts;
    let proxy = context.require(contracts.proxy, "contracts.proxy")?;
    let from = context.require(contracts.vesting_holder, "contracts.vesting_holder")?;
    let to = context.require(contracts.vesting_beneficiary, "contracts.vesting_beneficiary")?;
    let session = context.session();
    let identities = context.identities(false)?;
    let admin = context.administrator(&session, &identities)?;
    let dat = ContractHandle::<Dat>::new(proxy, admin);

    let moved: Rebalance = match amount {
        Some(amount) => rebalance::burn_and_mint(&session, &dat, from, to, amount)?,
        None => rebalance::drain(&session, &dat, from, to)?,
    };
    println!("Moved {} from {:#x} to {:#x}", moved.amount, moved.from, moved.to);
    println!("  burn tx {:#x}", moved.burn.transaction_hash);
    println!("  mint tx {:#x}", moved.mint.transaction_hash);
    println!("  total supply {}", moved.total_supply);
    Ok(())
}

pub fn transfer_control(context: &Context, to: Address) -> Result<(), CliError> {
    let contracts = &context.settings.config.contracts;
    let proxy = context.require(contracts.proxy, "contracts.proxy")?;
    let session = context.session();
    let identities = context.identities(false)?;
    let admin = context.administrator(&session, &identities)?;
    let dat = ContractHandle::<Dat>::new(proxy, admin);

    let transfer = governance::transfer_control(&session, &dat, RoleAssignment::single(to))?;
    println!(
        "Control moved from {:#x} to {to:#x} in tx {:#x}",
        transfer.previous_control, transfer.receipt.transaction_hash
    );
    Ok(())
}

pub fn run_campaign(context: &Context, transfer_control: bool) -> Result<(), CliError> {
    let plan = context.plan(transfer_control)?;
    let session = context.session();
    let identities = context.identities(false)?;
    let deployer = context.deployer(&identities, false)?;
    let artifact = context.artifact()?;

    match Campaign::new(&session, &identities, &deployer, &artifact, plan).run() {
        Ok(report) => {
            print!("{report}");
            println!("{}", "Campaign complete".green().bold());
            Ok(())
        }
        Err(aborted) => {
            print!("{}", aborted.completed);
            Err(aborted.into())
        }
    }
}
