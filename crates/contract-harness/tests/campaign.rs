mod common;

use dat_contract_harness::{Campaign, CampaignPlan, Session};
use ethers_core::types::{Address, U256};
use ledger::Ledger;
use pretty_assertions::assert_eq;
use test_utils::{fixtures, mainnet_fork, DatVariant, MainnetFork};

fn plan(fork: &MainnetFork) -> CampaignPlan {
    CampaignPlan {
        proxy: fork.dat_proxy,
        proxy_admin: fork.proxy_admin,
        administrator: fork.avatar,
        admin_funding: U256::exp10(18),
        treasury_token: fork.usdc,
        vesting_holder: fork.vesting,
        vesting_beneficiary: fork.vesting_beneficiary,
        control_successor: None,
    }
}

#[test]
fn default_campaign_runs_every_step() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = common::dat_artifact(DatVariant::Standard);

    let report = Campaign::new(&session, &identities, &deployer, &artifact, plan(&fork))
        .run()
        .unwrap();
    let steps: Vec<&str> = report.steps.iter().map(|outcome| outcome.step).collect();
    assert_eq!(
        steps,
        [
            "acquire administrator",
            "fund administrator",
            "deploy implementation",
            "snapshot before upgrade",
            "upgrade proxy",
            "verify implementation",
            "snapshot after upgrade",
            "compare snapshots",
            "withdraw native currency",
            "withdraw treasury token",
            "rebalance vesting holder",
        ]
    );
    let snapshot = report.snapshot.as_ref().unwrap();
    assert_eq!(snapshot.get("symbol"), Some("DXD"));
    assert!(report.implementation.is_some());
    assert!(report.to_string().starts_with(" 1. acquire administrator: "));

    assert_eq!(fork.ledger.balance(fork.dat_proxy, None).unwrap(), U256::zero());
    assert_eq!(
        fork.ledger.token_balance(fork.usdc, fork.avatar),
        fixtures::proxy_usdc_balance()
    );
    let storage = fork.ledger.dat_storage(fork.dat_proxy).unwrap();
    assert_eq!(storage.balance_of(fork.vesting), U256::zero());
    assert_eq!(
        storage.balance_of(fork.vesting_beneficiary),
        fixtures::vesting_balance()
    );
    assert_eq!(storage.control, fork.avatar);
}

#[test]
fn control_transfer_runs_last_when_requested() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = common::dat_artifact(DatVariant::Standard);
    let successor = Address::repeat_byte(0xc0);
    let plan = CampaignPlan {
        control_successor: Some(successor),
        ..plan(&fork)
    };

    let report = Campaign::new(&session, &identities, &deployer, &artifact, plan)
        .run()
        .unwrap();
    assert_eq!(report.steps.len(), 12);
    assert_eq!(report.steps[11].step, "transfer control");
    let storage = fork.ledger.dat_storage(fork.dat_proxy).unwrap();
    assert_eq!(storage.control, successor);
    assert_eq!(storage.beneficiary, successor);
}

#[test]
fn campaign_stops_at_first_failure() {
    let fork = mainnet_fork();
    let identities = common::provider(&fork);
    let deployer = common::deployer(&identities);
    let session = Session::new(&fork.ledger);
    let artifact = common::dat_artifact(DatVariant::ShiftedStorage);

    let aborted = Campaign::new(&session, &identities, &deployer, &artifact, plan(&fork))
        .run()
        .unwrap_err();
    assert_eq!(aborted.step, "compare snapshots");
    assert_eq!(aborted.error.kind(), "InvariantViolation");
    assert_eq!(aborted.completed.steps.len(), 7);
    assert!(aborted.completed.implementation.is_some());
    assert!(aborted
        .to_string()
        .starts_with("campaign aborted at step `compare snapshots`: invariant violated"));

    // nothing after the failed step ran
    assert_eq!(
        fork.ledger.balance(fork.dat_proxy, None).unwrap(),
        fixtures::proxy_native_balance()
    );
}
